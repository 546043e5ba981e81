//! The runtime adapter trait.

use async_trait::async_trait;

use kindlb_core::LabelFilter;

use crate::container::{Container, Signal};
use crate::error::RuntimeResult;

/// Parameters for creating a load-balancer container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLoadBalancer {
    /// Container name (also used as hostname).
    pub name: String,
    pub image: String,
    /// Cluster the container is labelled with.
    pub cluster: String,
    /// Host address the frontend port is published on.
    pub listen_address: String,
    /// Host port; `0` lets the runtime pick one.
    pub port: u16,
}

/// Operations the orchestrator needs from a container runtime.
///
/// Implementations must be cancel-safe: the orchestrator drops an
/// in-flight future when its cancellation token fires.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Create and start a load-balancer container labelled for its cluster.
    async fn create_load_balancer(&self, request: &CreateLoadBalancer) -> RuntimeResult<Container>;

    /// List containers matching every predicate of `filter`, running or not.
    async fn list(&self, filter: &LabelFilter) -> RuntimeResult<Vec<Container>>;

    /// The container's IP address, or an empty string if it has none
    /// (for example because it is stopped).
    async fn address(&self, container: &Container) -> RuntimeResult<String>;

    /// Write `content` to `path` inside the container, replacing any
    /// existing file.
    async fn write_file(&self, container: &Container, path: &str, content: &[u8]) -> RuntimeResult<()>;

    /// Deliver a signal to the container's main process.
    async fn signal(&self, container: &Container, signal: Signal) -> RuntimeResult<()>;

    /// Ask the process to reload its configuration.
    ///
    /// Defaults to `SIGHUP`; runtimes without unix signals override this.
    async fn trigger_reload(&self, container: &Container) -> RuntimeResult<()> {
        self.signal(container, Signal::Hangup).await
    }

    /// Remove the container and its anonymous volumes.
    async fn delete(&self, container: &Container) -> RuntimeResult<()>;
}
