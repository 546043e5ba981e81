//! kindlb-render — load-balancer configuration rendering.
//!
//! A [`ConfigRenderer`] turns a complete [`BackendSet`] plus
//! [`ConfigData`] options into the bytes written into the load-balancer
//! container. Rendering is pure and deterministic: the same input always
//! produces the same document.
//!
//! [`BackendSet`]: kindlb_core::BackendSet

pub mod haproxy;

use thiserror::Error;

use kindlb_core::{BackendSet, RenderConfig, CONTROL_PLANE_PORT};

pub use haproxy::{HaproxyRenderer, HAPROXY_CONFIG_PATH};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid backend {name:?}: {reason}")]
    InvalidBackend { name: String, reason: String },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Options applied to every rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigData {
    /// Port the frontend binds inside the container.
    pub control_plane_port: u16,
    /// Serve the HAProxy stats page.
    pub enable_stats: bool,
    /// Also bind the frontend on IPv6 and prefer IPv6 resolution.
    pub ipv6: bool,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            control_plane_port: CONTROL_PLANE_PORT,
            enable_stats: true,
            ipv6: false,
        }
    }
}

impl From<&RenderConfig> for ConfigData {
    fn from(config: &RenderConfig) -> Self {
        Self {
            control_plane_port: CONTROL_PLANE_PORT,
            enable_stats: config.enable_stats,
            ipv6: config.ipv6,
        }
    }
}

/// Maps a backend set to a load-balancer configuration document.
pub trait ConfigRenderer: Send + Sync {
    fn render(&self, backends: &BackendSet, data: &ConfigData) -> RenderResult<Vec<u8>>;

    /// Where the document lives inside the load-balancer container.
    fn config_path(&self) -> &str;
}
