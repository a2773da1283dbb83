//! Configuration types for Framecast
//!
//! Runtime options for the capture worker, the viewer loops and the HTTP
//! server, resolved from the TOML config file, the environment and CLI flags.

mod file;

pub use file::{CaptureSettings, ConfigFile, ServerSettings, StreamSettings, sample_config};

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{FramecastError, Result};

/// Environment variable that overrides the listen port
pub const PORT_ENV: &str = "PORT";

/// Transport used for RTSP sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RtspTransport {
    /// Interleaved over the RTSP connection (works through NAT)
    #[default]
    Tcp,
    /// Separate RTP/UDP ports (lower latency on a LAN)
    Udp,
}

impl RtspTransport {
    /// Value of FFmpeg's `rtsp_transport` option
    pub fn as_ffmpeg_option(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl std::fmt::Display for RtspTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ffmpeg_option())
    }
}

impl std::str::FromStr for RtspTransport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(format!("Unknown RTSP transport: {}", s)),
        }
    }
}

/// Options for opening and reading upstream sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// RTSP transport
    pub rtsp_transport: RtspTransport,
    /// Socket timeout for opening and reading the source
    pub open_timeout: Duration,
    /// Capacity of the per-session frame broadcast
    pub frame_queue: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            rtsp_transport: RtspTransport::Tcp,
            open_timeout: Duration::from_millis(5000),
            frame_queue: 4,
        }
    }
}

/// Options for each viewer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherOptions {
    /// Encoded chunks buffered between the loop and the HTTP body
    pub viewer_queue: usize,
    /// Consecutive encode failures before the viewer is closed
    pub max_consecutive_encode_failures: u32,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            viewer_queue: 2,
            max_consecutive_encode_failures: 30,
        }
    }
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Address the HTTP server binds to
    pub bind: SocketAddr,
    /// Capture options
    pub capture: CaptureOptions,
    /// Viewer loop options
    pub publisher: PublisherOptions,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            capture: CaptureOptions::default(),
            publisher: PublisherOptions::default(),
        }
    }
}

impl RuntimeConfig {
    /// Resolve a config file into runtime options
    pub fn from_file(file: &ConfigFile) -> Result<Self> {
        let ip: IpAddr = file.server.bind.parse().map_err(|e| {
            FramecastError::config(format!("Invalid bind address '{}': {}", file.server.bind, e))
        })?;
        let rtsp_transport = file
            .capture
            .rtsp_transport
            .parse()
            .map_err(FramecastError::config)?;

        Ok(Self {
            bind: SocketAddr::new(ip, file.server.port),
            capture: CaptureOptions {
                rtsp_transport,
                open_timeout: Duration::from_millis(file.capture.open_timeout_ms),
                frame_queue: file.capture.frame_queue.max(1),
            },
            publisher: PublisherOptions {
                viewer_queue: file.stream.viewer_queue.max(1),
                max_consecutive_encode_failures: file.stream.max_consecutive_encode_failures.max(1),
            },
        })
    }

    /// Apply a `PORT` value from the environment, if one is set
    pub fn apply_port_env(&mut self, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let port: u16 = value
            .trim()
            .parse()
            .map_err(|e| FramecastError::config(format!("Invalid {} '{}': {}", PORT_ENV, value, e)))?;
        self.bind.set_port(port);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_parse() {
        assert_eq!("tcp".parse::<RtspTransport>(), Ok(RtspTransport::Tcp));
        assert_eq!("UDP".parse::<RtspTransport>(), Ok(RtspTransport::Udp));
        assert!("http".parse::<RtspTransport>().is_err());
    }

    #[test]
    fn test_runtime_from_default_file() {
        let config = RuntimeConfig::from_file(&ConfigFile::default()).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_port_env_override() {
        let mut config = RuntimeConfig::default();
        config.apply_port_env(Some("8080")).unwrap();
        assert_eq!(config.bind.port(), 8080);

        config.apply_port_env(None).unwrap();
        assert_eq!(config.bind.port(), 8080);

        assert!(config.apply_port_env(Some("http")).is_err());
    }

    #[test]
    fn test_queues_clamped() {
        let mut file = ConfigFile::default();
        file.capture.frame_queue = 0;
        file.stream.viewer_queue = 0;
        let config = RuntimeConfig::from_file(&file).unwrap();
        assert_eq!(config.capture.frame_queue, 1);
        assert_eq!(config.publisher.viewer_queue, 1);
    }

    #[test]
    fn test_invalid_bind() {
        let mut file = ConfigFile::default();
        file.server.bind = "not-an-ip".into();
        assert!(matches!(
            RuntimeConfig::from_file(&file),
            Err(FramecastError::Config(_))
        ));
    }
}
