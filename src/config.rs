//! Client configuration
//!
//! Where to connect and how to identify this client. Settings can come
//! from a JSON file, from environment variables, or from code.
//!
//! # Config Location
//!
//! [`ClientConfig::load_or_default`] looks for `client.json` in the
//! platform config directory:
//! - **Linux**: `~/.config/uif/client.json`
//! - **macOS**: `~/Library/Application Support/uif/client.json`
//! - **Windows**: `%APPDATA%\uif\client.json`
//!
//! # Environment Overrides
//!
//! - `UIF_URL` - websocket url of the host
//! - `UIF_CLIENT_ID` - client identifier sent with every transaction
//!
//! # Example
//!
//! ```ignore
//! use uif_client::{Client, ClientConfig};
//!
//! let config = ClientConfig::load_or_default();
//! let client = Client::dial(&config)?;
//! ```

use crate::error::{Result, UifError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "uif";

/// Config filename
pub const CONFIG_FILE: &str = "client.json";

/// Default host address
pub const DEFAULT_URL: &str = "ws://127.0.0.1:3012/";

/// Default client identifier
pub const DEFAULT_CLIENT_ID: &str = "gouif2";

/// Default name of the read loop thread
pub const DEFAULT_READ_THREAD_NAME: &str = "uif-read-loop";

/// Environment variable overriding [`ClientConfig::url`]
pub const ENV_URL: &str = "UIF_URL";

/// Environment variable overriding [`ClientConfig::client_id`]
pub const ENV_CLIENT_ID: &str = "UIF_CLIENT_ID";

/// Connection settings for a [`crate::Client`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Websocket url of the host (`ws://` only)
    pub url: String,

    /// Identifier sent in every transaction
    pub client_id: String,

    /// Name given to the inbound read loop thread
    pub read_thread_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            read_thread_name: DEFAULT_READ_THREAD_NAME.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Default config file path, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            UifError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            UifError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    UifError::Config(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| UifError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| UifError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Load from the default location, falling back to defaults, then
    /// apply environment overrides
    pub fn load_or_default() -> Self {
        let config = match Self::default_path() {
            Some(path) if path.exists() => match Self::load(&path) {
                Ok(config) => {
                    tracing::info!("Loaded client config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load client config: {}", e);
                    Self::default()
                }
            },
            _ => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Apply `UIF_URL` / `UIF_CLIENT_ID` if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_URL) {
            tracing::debug!("{} overrides url", ENV_URL);
            self.url = url;
        }
        if let Ok(client_id) = std::env::var(ENV_CLIENT_ID) {
            tracing::debug!("{} overrides client id", ENV_CLIENT_ID);
            self.client_id = client_id;
        }
        self
    }
}
