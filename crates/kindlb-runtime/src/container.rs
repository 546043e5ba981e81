//! Container handles and signals.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use kindlb_core::{NodeRole, CLUSTER_LABEL_KEY, NODE_ROLE_LABEL_KEY};

/// Handle to a container known to the runtime.
///
/// The name is the stable identity; labels are whatever the runtime
/// reported when the handle was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// A container labelled as a node of `cluster` with `role`.
    pub fn node(name: impl Into<String>, cluster: &str, role: NodeRole) -> Self {
        Self::new(name)
            .with_label(CLUSTER_LABEL_KEY, cluster)
            .with_label(NODE_ROLE_LABEL_KEY, role.as_str())
    }

    pub fn cluster(&self) -> Option<&str> {
        self.labels.get(CLUSTER_LABEL_KEY).map(String::as_str)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Signals that can be delivered to a container's main process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Reload configuration.
    Hangup,
    Terminate,
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
