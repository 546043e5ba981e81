//! kindlb-runtime — container runtime adapters.
//!
//! The orchestrator talks to containers only through [`RuntimeAdapter`].
//! Two implementations ship here:
//!
//! - **`docker`** — drives the `docker` CLI via `tokio::process`
//! - **`memory`** — an in-memory runtime with a call log and fault
//!   injection, used by tests and dry runs
//!
//! # Architecture
//!
//! ```text
//! RuntimeAdapter
//!   ├── create_load_balancer(CreateLoadBalancer) → Container
//!   ├── list(LabelFilter) → [Container]
//!   ├── address(Container) → String ("" = not yet addressable)
//!   ├── write_file(Container, path, bytes)
//!   ├── signal(Container, Signal) / trigger_reload(Container)
//!   └── delete(Container)
//! ```

pub mod adapter;
pub mod container;
pub mod docker;
pub mod error;
pub mod memory;

pub use adapter::{CreateLoadBalancer, RuntimeAdapter};
pub use container::{Container, Signal};
pub use docker::DockerCli;
pub use error::{RuntimeError, RuntimeResult};
pub use memory::{Call, InMemoryRuntime, Operation};
