//! Test data builders for creating node trees

use uif_client::Node;

/// Builder for a window holding a flat list of widgets
pub struct FormBuilder {
    title: String,
    fields: Vec<Node>,
}

impl FormBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn label(mut self, text: &str) -> Self {
        self.fields.push(Node::label(text));
        self
    }

    pub fn text_input(mut self, text: &str) -> Self {
        self.fields.push(Node::text_input(text));
        self
    }

    pub fn combo_box(mut self, label: &str, options: &[&str]) -> Self {
        self.fields
            .push(Node::combo_box(label, options.iter().copied()));
        self
    }

    pub fn button(mut self, text: &str) -> Self {
        self.fields.push(Node::button(text));
        self
    }

    /// Build the detached window and return it with its fields
    pub fn build(self) -> (Node, Vec<Node>) {
        let window = Node::window(self.title);
        for field in &self.fields {
            window
                .append(field)
                .expect("fresh nodes can always be appended");
        }
        (window, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_builder() {
        let (window, fields) = FormBuilder::new("Settings")
            .label("Name")
            .text_input("")
            .build();

        assert_eq!(fields.len(), 2);
        assert_eq!(window.children().len(), 2);
        assert_eq!(fields[1].parent_id(), Some(window.id()));
        assert!(!window.is_attached());
    }
}
