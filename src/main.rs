//! UIF sink - demo client
//!
//! Shows a label that mirrors whatever is typed into a text input, plus a
//! mode selector and a button counting clicks. Connects to the host named
//! by the client config (see `uif_client::config`).

use anyhow::Context;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uif_client::{Client, ClientConfig, Node};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,uif_client=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::load_or_default();
    let client = Client::dial(&config).with_context(|| format!("Failed to dial {}", config.url))?;

    let window = Node::window("UIF sink");
    let echo = Node::label("Hello");
    let input = Node::text_input("");
    let row = Node::row();
    let mode = Node::combo_box("Mode", ["Fast", "Accurate"]);
    let button = Node::button("Clicked 0 times");
    row.append(&mode)?;
    row.append(&button)?;
    window.append(&echo)?;
    window.append(&input)?;
    window.append(&row)?;
    client.root().append(&window)?;

    let mirror = echo.clone();
    input.on_changed(move |input, _event| {
        mirror.set_text(input.text().unwrap_or_default())?;
        input.flush()
    })?;

    mode.on_changed(|mode, _event| {
        tracing::info!("Mode is now {:?}", mode.selected());
        Ok(())
    })?;

    let clicks = Arc::new(AtomicU32::new(0));
    button.on_clicked(move |button, _event| {
        let n = clicks.fetch_add(1, Ordering::Relaxed) + 1;
        button.set_text(format!("Clicked {} times", n))?;
        button.flush()
    })?;

    client.flush().context("Initial flush failed")?;
    tracing::info!("Tree sent; waiting for events");

    let reason = loop {
        if let Some(reason) = client.wait_for_disconnect(Duration::from_secs(1)) {
            break reason;
        }
    };
    tracing::info!("Disconnected: {}", reason);
    Ok(())
}
