//! kindlb-orchestrator — lifecycle of a cluster's external load balancer.
//!
//! One [`LoadBalancer`] manages the single load-balancer container that
//! fronts a cluster's control-plane nodes:
//!
//! - **Construct** looks up an existing container (never creates one)
//! - **Create** provisions the container if it is missing
//! - **UpdateConfiguration** rediscovers control-plane nodes, renders a
//!   complete config, writes it, then triggers a reload
//! - **IP** reports the container's address
//! - **Delete** removes the container
//!
//! # Architecture
//!
//! ```text
//! LoadBalancerRegistry (one mutex per cluster)
//!   └── LoadBalancer
//!       ├── Discovery ──► RuntimeAdapter::list / address
//!       ├── ConfigRenderer (full BackendSet → bytes)
//!       └── RuntimeAdapter::create / write_file / trigger_reload / delete
//! ```
//!
//! Every operation takes a `CancellationToken`; when it fires the in-flight
//! runtime call is dropped and the operation returns
//! [`LoadBalancerError::Cancelled`]. Nothing retries internally.

pub mod cancel;
pub mod discovery;
pub mod error;
pub mod load_balancer;
pub mod registry;

pub use discovery::Discovery;
pub use error::{LoadBalancerError, LoadBalancerResult};
pub use load_balancer::{ConfigUpdate, LoadBalancer, LoadBalancerContext, LoadBalancerStatus};
pub use registry::LoadBalancerRegistry;

pub use tokio_util::sync::CancellationToken;
