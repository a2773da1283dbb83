//! Configuration file loading
//!
//! Loads user configuration from `~/.config/framecast/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{FramecastError, Result};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Upstream capture settings
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Viewer stream settings
    #[serde(default)]
    pub stream: StreamSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on (overridden by `PORT`)
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Upstream capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// RTSP transport (tcp, udp)
    #[serde(default = "default_rtsp_transport")]
    pub rtsp_transport: String,

    /// Socket timeout for opening and reading sources, in milliseconds
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Frames buffered per session before slow viewers start dropping
    #[serde(default = "default_frame_queue")]
    pub frame_queue: usize,
}

/// Viewer stream settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Encoded chunks buffered per viewer
    #[serde(default = "default_viewer_queue")]
    pub viewer_queue: usize,

    /// Consecutive encode failures before a viewer is closed
    #[serde(default = "default_max_encode_failures")]
    pub max_consecutive_encode_failures: u32,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_rtsp_transport() -> String {
    "tcp".to_string()
}

fn default_open_timeout_ms() -> u64 {
    5000
}

fn default_frame_queue() -> usize {
    4
}

fn default_viewer_queue() -> usize {
    2
}

fn default_max_encode_failures() -> u32 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            rtsp_transport: default_rtsp_transport(),
            open_timeout_ms: default_open_timeout_ms(),
            frame_queue: default_frame_queue(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            viewer_queue: default_viewer_queue(),
            max_consecutive_encode_failures: default_max_encode_failures(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("framecast").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("framecast")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/framecast/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    ///
    /// A missing file is not an error; defaults are returned instead.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            FramecastError::from(e).with_context(format!("Failed to read {}", path.display()))
        })?;

        let config = Self::parse(&content)
            .map_err(|e| e.with_context(format!("Invalid config file {}", path.display())))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FramecastError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FramecastError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| FramecastError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FramecastError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Create a default config file if it doesn't exist
    ///
    /// Returns `true` when a file was written.
    pub fn create_default_if_missing(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to(path)?;
        Ok(true)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Framecast Configuration

[server]
# Address to bind the HTTP API to
bind = "0.0.0.0"

# Port to listen on (the PORT environment variable takes precedence)
port = 5000

[capture]
# RTSP transport: tcp, udp
rtsp_transport = "tcp"

# Socket timeout for opening and reading the camera, in milliseconds
open_timeout_ms = 5000

# Frames buffered per session; slow viewers drop the oldest beyond this
frame_queue = 4

[stream]
# Encoded JPEG parts buffered per viewer connection
viewer_queue = 2

# Close a viewer after this many encode failures in a row
max_consecutive_encode_failures = 30
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.capture.rtsp_transport, "tcp");
        assert_eq!(config.stream.max_consecutive_encode_failures, 30);
    }

    #[test]
    fn test_sample_config_parses() {
        let config = ConfigFile::parse(&sample_config()).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_partial_config() {
        let config = ConfigFile::parse("[server]\nport = 8080\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.capture.frame_queue, 4);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ConfigFile::parse("[server\nport = "),
            Err(FramecastError::Config(_))
        ));
    }
}
