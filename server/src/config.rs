//! Server configuration.
//!
//! Values come from defaults, then an optional JSON file, then CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::args::Args;

const APP_DIR: &str = "filebridge";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub listen: String,
    /// Browser UI assets; skipped when the directory does not exist.
    pub static_dir: PathBuf,
    /// Where multipart uploads are staged before being pushed.
    pub upload_dir: PathBuf,
    /// Saved sites.
    pub sites_file: PathBuf,
    /// Upper bound for closing each session on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            static_dir: PathBuf::from("public"),
            upload_dir: std::env::temp_dir().join("filebridge-uploads"),
            sites_file: config_dir().join("sites.json"),
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Build the effective configuration for `args`.
    pub fn resolve(args: &Args) -> Self {
        let path = args
            .config
            .clone()
            .unwrap_or_else(|| config_dir().join("config.json"));
        let mut config = Self::load_from(&path);

        if let Some(listen) = &args.listen {
            config.listen = listen.clone();
        }
        if let Some(static_dir) = &args.static_dir {
            config.static_dir = static_dir.clone();
        }
        config
    }

    /// Load from a JSON file. A missing or corrupt file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<ServerConfig>(&contents) {
                Ok(config) => {
                    debug!("Loaded server config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse server config from {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                debug!("No server config file at {}", path.display());
                Self::default()
            }
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Platform config directory for filebridge.
fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(APP_DIR)
}
