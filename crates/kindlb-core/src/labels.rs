//! Container labels used to tag and discover cluster nodes.
//!
//! Every node container carries two labels: the cluster it belongs to and
//! its role. Discovery is always an equality match over these keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label carrying the owning cluster's name.
pub const CLUSTER_LABEL_KEY: &str = "io.x-k8s.kind.cluster";

/// Label carrying the node role.
pub const NODE_ROLE_LABEL_KEY: &str = "io.x-k8s.kind.role";

/// Role of a node container within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
    ExternalLoadBalancer,
}

impl NodeRole {
    /// The label value for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::ControlPlane => "control-plane",
            NodeRole::Worker => "worker",
            NodeRole::ExternalLoadBalancer => "external-load-balancer",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conjunction of `key = value` label predicates.
///
/// An empty filter matches every container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    predicates: BTreeMap<String, String>,
}

impl LabelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter for nodes of `role` belonging to `cluster`.
    pub fn cluster_role(cluster: &str, role: NodeRole) -> Self {
        Self::new().cluster(cluster).role(role)
    }

    /// Require the cluster label to equal `cluster`.
    pub fn cluster(self, cluster: &str) -> Self {
        self.with_label(CLUSTER_LABEL_KEY, cluster)
    }

    /// Require the role label to equal `role`.
    pub fn role(self, role: NodeRole) -> Self {
        self.with_label(NODE_ROLE_LABEL_KEY, role.as_str())
    }

    /// Add an arbitrary equality predicate. A later value for the same key
    /// replaces the earlier one.
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.predicates.insert(key.to_string(), value.to_string());
        self
    }

    /// Iterate over `(key, value)` predicates in key order.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predicates
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether a container with `labels` satisfies every predicate.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.predicates
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.predicates {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}
