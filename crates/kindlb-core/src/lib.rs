//! kindlb-core — shared types for the kindlb workspace.
//!
//! - **`labels`** — the kind label namespace, node roles, and `LabelFilter`
//! - **`types`** — `BackendRecord` and `BackendSet`
//! - **`config`** — `kindlb.toml` parsing and image defaults

pub mod config;
pub mod labels;
pub mod types;

pub use config::{ClusterConfig, ConfigError, DockerConfig, ImageDefaults, KindlbConfig, RenderConfig};
pub use labels::{LabelFilter, NodeRole, CLUSTER_LABEL_KEY, NODE_ROLE_LABEL_KEY};
pub use types::*;

/// Port the Kubernetes API server listens on inside every control-plane node.
pub const CONTROL_PLANE_PORT: u16 = 6443;

/// Address the load-balancer container publishes its frontend on.
pub const LOAD_BALANCER_LISTEN_ADDRESS: &str = "0.0.0.0";
