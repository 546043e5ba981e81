//! Backend discovery: finds a cluster's nodes by label and resolves them
//! into a backend set.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kindlb_core::{BackendRecord, BackendSet, LabelFilter, NodeRole};
use kindlb_runtime::{Container, RuntimeAdapter, RuntimeResult};

use crate::cancel::cancellable;
use crate::error::{LoadBalancerError, LoadBalancerResult};

/// Label-based lookup of cluster node containers.
#[derive(Clone)]
pub struct Discovery {
    runtime: Arc<dyn RuntimeAdapter>,
}

impl Discovery {
    pub fn new(runtime: Arc<dyn RuntimeAdapter>) -> Self {
        Self { runtime }
    }

    /// Containers of `cluster` with `role`, running or not, sorted by name.
    pub async fn nodes(&self, cluster: &str, role: NodeRole) -> RuntimeResult<Vec<Container>> {
        let filter = LabelFilter::cluster_role(cluster, role);
        let mut nodes = self.runtime.list(&filter).await?;
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(%cluster, %role, count = nodes.len(), "discovered nodes");
        Ok(nodes)
    }

    /// The cluster's load-balancer container, if one exists.
    ///
    /// More than one match is an inventory inconsistency; the first by name
    /// is returned.
    pub async fn load_balancer(&self, cluster: &str) -> RuntimeResult<Option<Container>> {
        let mut found = self.nodes(cluster, NodeRole::ExternalLoadBalancer).await?;
        if found.len() > 1 {
            let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
            warn!(%cluster, containers = ?names, "multiple load balancer containers found, using the first");
        }
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    pub async fn control_plane_nodes(&self, cluster: &str) -> RuntimeResult<Vec<Container>> {
        self.nodes(cluster, NodeRole::ControlPlane).await
    }

    /// Resolve every node's address into a complete backend set.
    ///
    /// Fails on the first node whose lookup errors or that has no address;
    /// a partial set is never returned.
    pub async fn resolve_backends(
        &self,
        cluster: &str,
        nodes: &[Container],
        port: u16,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<BackendSet> {
        let mut records = Vec::with_capacity(nodes.len());
        for node in nodes {
            let address = match cancellable(cancel, self.runtime.address(node)).await {
                None => {
                    return Err(LoadBalancerError::Cancelled {
                        operation: "resolve control-plane nodes",
                        cluster: cluster.to_string(),
                    });
                }
                Some(Err(e)) => {
                    return Err(LoadBalancerError::BackendResolutionFailed {
                        cluster: cluster.to_string(),
                        node: node.name.clone(),
                        reason: e.to_string(),
                        cause: Some(e),
                    });
                }
                Some(Ok(address)) if address.is_empty() => {
                    return Err(LoadBalancerError::BackendResolutionFailed {
                        cluster: cluster.to_string(),
                        node: node.name.clone(),
                        reason: "node has no IP address".to_string(),
                        cause: None,
                    });
                }
                Some(Ok(address)) => address,
            };
            records.push(BackendRecord::new(node.name.clone(), &address, port));
        }
        Ok(records.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindlb_runtime::{InMemoryRuntime, Operation};

    fn setup() -> (InMemoryRuntime, Discovery) {
        let runtime = InMemoryRuntime::new();
        let discovery = Discovery::new(Arc::new(runtime.clone()));
        (runtime, discovery)
    }

    #[tokio::test]
    async fn control_plane_nodes_are_sorted_and_scoped() {
        let (runtime, discovery) = setup();
        runtime.add_node("demo", NodeRole::ControlPlane, "demo-cp-b", "10.0.0.6");
        runtime.add_node("demo", NodeRole::ControlPlane, "demo-cp-a", "10.0.0.5");
        runtime.add_node("demo", NodeRole::Worker, "demo-worker", "10.0.0.7");
        runtime.add_node("prod", NodeRole::ControlPlane, "prod-cp", "10.1.0.5");

        let nodes = discovery.control_plane_nodes("demo").await.unwrap();
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["demo-cp-a", "demo-cp-b"]);
    }

    #[tokio::test]
    async fn load_balancer_absent() {
        let (_runtime, discovery) = setup();
        assert!(discovery.load_balancer("demo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_balancer_found_even_when_stopped() {
        let (runtime, discovery) = setup();
        runtime.add_node("demo", NodeRole::ExternalLoadBalancer, "demo-lb", "");
        let lb = discovery.load_balancer("demo").await.unwrap().unwrap();
        assert_eq!(lb.name, "demo-lb");
    }

    #[tokio::test]
    async fn duplicate_load_balancers_pick_first_by_name() {
        let (runtime, discovery) = setup();
        runtime.add_node("demo", NodeRole::ExternalLoadBalancer, "demo-lb-2", "172.18.0.3");
        runtime.add_node("demo", NodeRole::ExternalLoadBalancer, "demo-lb", "172.18.0.2");
        let lb = discovery.load_balancer("demo").await.unwrap().unwrap();
        assert_eq!(lb.name, "demo-lb");
    }

    #[tokio::test]
    async fn resolve_builds_complete_set() {
        let (runtime, discovery) = setup();
        let a = runtime.add_node("demo", NodeRole::ControlPlane, "a", "10.0.0.1");
        let b = runtime.add_node("demo", NodeRole::ControlPlane, "b", "10.0.0.2");

        let set = discovery
            .resolve_backends("demo", &[a, b], 6443, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(set.get("a"), Some("10.0.0.1:6443"));
        assert_eq!(set.get("b"), Some("10.0.0.2:6443"));
    }

    #[tokio::test]
    async fn resolve_fails_on_lookup_error() {
        let (runtime, discovery) = setup();
        let a = runtime.add_node("demo", NodeRole::ControlPlane, "a", "10.0.0.1");
        let b = runtime.add_node("demo", NodeRole::ControlPlane, "b", "10.0.0.2");
        runtime.fail_address("b", "inspect timed out");

        let err = discovery
            .resolve_backends("demo", &[a, b], 6443, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            LoadBalancerError::BackendResolutionFailed { node, cause, .. } => {
                assert_eq!(node, "b");
                assert!(cause.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn resolve_fails_on_empty_address() {
        let (runtime, discovery) = setup();
        let a = runtime.add_node("demo", NodeRole::ControlPlane, "a", "");

        let err = discovery
            .resolve_backends("demo", &[a], 6443, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoadBalancerError::BackendResolutionFailed { cause: None, .. }
        ));
    }

    #[tokio::test]
    async fn resolve_honours_cancellation() {
        let (runtime, discovery) = setup();
        let a = runtime.add_node("demo", NodeRole::ControlPlane, "a", "10.0.0.1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = discovery
            .resolve_backends("demo", &[a], 6443, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(runtime.count(Operation::Address), 0);
    }
}
