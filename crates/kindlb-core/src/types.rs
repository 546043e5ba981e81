//! Backend records and the backend set fed to the config renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One control-plane replica the load balancer routes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRecord {
    /// Container name of the node.
    pub name: String,
    /// `host:port` endpoint.
    pub endpoint: String,
}

impl BackendRecord {
    pub fn new(name: impl Into<String>, host: &str, port: u16) -> Self {
        Self {
            name: name.into(),
            endpoint: join_host_port(host, port),
        }
    }
}

/// The complete set of backends, keyed by node name.
///
/// A set is built in one go from an iterator of records and is never
/// edited afterwards; a membership change produces a new set. Iteration
/// is in name order so rendered output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSet {
    backends: BTreeMap<String, String>,
}

impl BackendSet {
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Endpoint for a backend name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.backends.get(name).map(String::as_str)
    }

    /// Iterate over `(name, endpoint)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.backends
            .iter()
            .map(|(name, endpoint)| (name.as_str(), endpoint.as_str()))
    }

    /// All endpoints in name order.
    pub fn endpoints(&self) -> Vec<&str> {
        self.backends.values().map(String::as_str).collect()
    }
}

impl FromIterator<BackendRecord> for BackendSet {
    fn from_iter<I: IntoIterator<Item = BackendRecord>>(iter: I) -> Self {
        Self {
            backends: iter
                .into_iter()
                .map(|record| (record.name, record.endpoint))
                .collect(),
        }
    }
}

/// Join a host and port, bracketing IPv6 literals (`[::1]:6443`).
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CONTROL_PLANE_PORT;

    #[test]
    fn join_ipv4_and_hostname() {
        assert_eq!(join_host_port("10.0.0.1", 6443), "10.0.0.1:6443");
        assert_eq!(join_host_port("node-a", 80), "node-a:80");
    }

    #[test]
    fn join_ipv6_brackets_host() {
        assert_eq!(join_host_port("fc00:f853::2", 6443), "[fc00:f853::2]:6443");
    }

    #[test]
    fn backend_set_is_keyed_and_sorted_by_name() {
        let set: BackendSet = vec![
            BackendRecord::new("demo-control-plane-b", "10.0.0.6", CONTROL_PLANE_PORT),
            BackendRecord::new("demo-control-plane-a", "10.0.0.5", CONTROL_PLANE_PORT),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("demo-control-plane-a"), Some("10.0.0.5:6443"));
        let names: Vec<_> = set.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["demo-control-plane-a", "demo-control-plane-b"]);
        assert_eq!(set.endpoints(), vec!["10.0.0.5:6443", "10.0.0.6:6443"]);
    }

    #[test]
    fn duplicate_names_keep_last_endpoint() {
        let set: BackendSet = vec![
            BackendRecord::new("cp", "10.0.0.1", 6443),
            BackendRecord::new("cp", "10.0.0.2", 6443),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("cp"), Some("10.0.0.2:6443"));
    }

    #[test]
    fn empty_set() {
        let set = BackendSet::default();
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
    }
}
