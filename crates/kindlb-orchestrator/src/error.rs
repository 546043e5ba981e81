//! Orchestrator error types.

use thiserror::Error;

use kindlb_render::RenderError;
use kindlb_runtime::RuntimeError;

pub type LoadBalancerResult<T> = Result<T, LoadBalancerError>;

/// Errors returned by load-balancer operations.
///
/// Every variant names the cluster; runtime failures also name the step
/// and container involved.
#[derive(Debug, Error)]
pub enum LoadBalancerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("load balancer for cluster {cluster} is not provisioned")]
    NotProvisioned { cluster: String },

    #[error(
        "load balancer IP cannot be empty: container {container} of cluster {cluster} does not have an associated IP address"
    )]
    AddressUnavailable { cluster: String, container: String },

    /// A control-plane node could not be resolved to an address; the
    /// update was abandoned before anything was written.
    #[error("cannot resolve control-plane node {node} of cluster {cluster}: {reason}")]
    BackendResolutionFailed {
        cluster: String,
        node: String,
        reason: String,
        #[source]
        cause: Option<RuntimeError>,
    },

    #[error("{operation} failed for cluster {cluster} (container {container}): {source}")]
    AdapterFailure {
        operation: &'static str,
        cluster: String,
        container: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to render load balancer config for cluster {cluster}: {source}")]
    Render {
        cluster: String,
        #[source]
        source: RenderError,
    },

    #[error("{operation} cancelled for cluster {cluster}")]
    Cancelled {
        operation: &'static str,
        cluster: String,
    },
}

impl LoadBalancerError {
    pub fn is_not_provisioned(&self) -> bool {
        matches!(self, LoadBalancerError::NotProvisioned { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadBalancerError::Cancelled { .. })
    }
}
