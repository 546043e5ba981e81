//! In-memory runtime adapter.
//!
//! Keeps containers, their addresses, written files, and delivered signals
//! in a shared table. Every adapter call is appended to a call log so tests
//! can assert exactly which runtime requests an operation issued. Faults
//! can be injected per operation or per container address, and an
//! operation can be stalled forever to exercise cancellation.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use kindlb_core::{LabelFilter, NodeRole};

use crate::adapter::{CreateLoadBalancer, RuntimeAdapter};
use crate::container::{Container, Signal};
use crate::error::{RuntimeError, RuntimeResult};

/// Adapter operation kinds, used for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    List,
    Address,
    WriteFile,
    Signal,
    Delete,
}

/// A recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(CreateLoadBalancer),
    List(LabelFilter),
    Address(String),
    WriteFile {
        container: String,
        path: String,
        content: Vec<u8>,
    },
    Signal {
        container: String,
        signal: Signal,
    },
    Delete(String),
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Create(_) => Operation::Create,
            Call::List(_) => Operation::List,
            Call::Address(_) => Operation::Address,
            Call::WriteFile { .. } => Operation::WriteFile,
            Call::Signal { .. } => Operation::Signal,
            Call::Delete(_) => Operation::Delete,
        }
    }
}

#[derive(Debug)]
struct Entry {
    container: Container,
    address: String,
    files: BTreeMap<String, Vec<u8>>,
    signals: Vec<Signal>,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, Entry>,
    calls: Vec<Call>,
    faults: HashMap<Operation, VecDeque<String>>,
    address_faults: HashMap<String, String>,
    stalled: HashSet<Operation>,
    created: u32,
}

/// A runtime that lives entirely in memory. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuntime {
    state: Arc<Mutex<State>>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Setup ───────────────────────────────────────────────────────

    /// Register an existing container with the given address (`""` for a
    /// stopped container).
    pub fn add_container(&self, container: Container, address: &str) {
        self.state().containers.insert(
            container.name.clone(),
            Entry {
                container,
                address: address.to_string(),
                files: BTreeMap::new(),
                signals: Vec::new(),
            },
        );
    }

    /// Register a node container of `cluster` with `role`.
    pub fn add_node(&self, cluster: &str, role: NodeRole, name: &str, address: &str) -> Container {
        let container = Container::node(name, cluster, role);
        self.add_container(container.clone(), address);
        container
    }

    pub fn set_address(&self, name: &str, address: &str) {
        if let Some(entry) = self.state().containers.get_mut(name) {
            entry.address = address.to_string();
        }
    }

    /// Remove a container without going through the adapter.
    pub fn remove_container(&self, name: &str) {
        self.state().containers.remove(name);
    }

    /// Fail the next call of `operation` with `message`. Queued faults are
    /// consumed in order.
    pub fn fail_next(&self, operation: Operation, message: &str) {
        self.state()
            .faults
            .entry(operation)
            .or_default()
            .push_back(message.to_string());
    }

    /// Fail every address lookup of `name` until cleared.
    pub fn fail_address(&self, name: &str, message: &str) {
        self.state()
            .address_faults
            .insert(name.to_string(), message.to_string());
    }

    pub fn clear_address_fault(&self, name: &str) {
        self.state().address_faults.remove(name);
    }

    /// Make every call of `operation` hang until its future is dropped.
    pub fn stall(&self, operation: Operation) {
        self.state().stalled.insert(operation);
    }

    pub fn unstall(&self, operation: Operation) {
        self.state().stalled.remove(&operation);
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn calls_of(&self, operation: Operation) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state().containers.contains_key(name)
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state().containers.keys().cloned().collect()
    }

    pub fn address_of(&self, name: &str) -> Option<String> {
        self.state()
            .containers
            .get(name)
            .map(|entry| entry.address.clone())
    }

    /// Content last written to `path` inside `name`.
    pub fn file(&self, name: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .containers
            .get(name)
            .and_then(|entry| entry.files.get(path).cloned())
    }

    /// Signals delivered to `name`, oldest first.
    pub fn signals(&self, name: &str) -> Vec<Signal> {
        self.state()
            .containers
            .get(name)
            .map(|entry| entry.signals.clone())
            .unwrap_or_default()
    }

    // ── Call bookkeeping ────────────────────────────────────────────

    /// Record `call`, then report whether it should stall or fail.
    fn begin(&self, call: Call) -> RuntimeResult<bool> {
        let operation = call.operation();
        let mut state = self.state();
        state.calls.push(call);
        if state.stalled.contains(&operation) {
            return Ok(true);
        }
        if let Some(message) = state
            .faults
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            debug!(?operation, %message, "injected runtime fault");
            return Err(RuntimeError::Failed(message));
        }
        Ok(false)
    }

    async fn enter(&self, call: Call) -> RuntimeResult<()> {
        if self.begin(call)? {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl RuntimeAdapter for InMemoryRuntime {
    async fn create_load_balancer(&self, request: &CreateLoadBalancer) -> RuntimeResult<Container> {
        self.enter(Call::Create(request.clone())).await?;

        let mut state = self.state();
        if state.containers.contains_key(&request.name) {
            return Err(RuntimeError::Failed(format!(
                "container name {} is already in use",
                request.name
            )));
        }
        state.created += 1;
        let address = format!("172.18.0.{}", 100 + state.created);
        let container = Container::node(
            request.name.clone(),
            &request.cluster,
            NodeRole::ExternalLoadBalancer,
        );
        state.containers.insert(
            request.name.clone(),
            Entry {
                container: container.clone(),
                address,
                files: BTreeMap::new(),
                signals: Vec::new(),
            },
        );
        Ok(container)
    }

    async fn list(&self, filter: &LabelFilter) -> RuntimeResult<Vec<Container>> {
        self.enter(Call::List(filter.clone())).await?;

        let state = self.state();
        Ok(state
            .containers
            .values()
            .filter(|entry| filter.matches(&entry.container.labels))
            .map(|entry| entry.container.clone())
            .collect())
    }

    async fn address(&self, container: &Container) -> RuntimeResult<String> {
        self.enter(Call::Address(container.name.clone())).await?;

        let state = self.state();
        if let Some(message) = state.address_faults.get(&container.name) {
            return Err(RuntimeError::Failed(message.clone()));
        }
        state
            .containers
            .get(&container.name)
            .map(|entry| entry.address.clone())
            .ok_or_else(|| RuntimeError::NotFound(container.name.clone()))
    }

    async fn write_file(&self, container: &Container, path: &str, content: &[u8]) -> RuntimeResult<()> {
        self.enter(Call::WriteFile {
            container: container.name.clone(),
            path: path.to_string(),
            content: content.to_vec(),
        })
        .await?;

        let mut state = self.state();
        let entry = state
            .containers
            .get_mut(&container.name)
            .ok_or_else(|| RuntimeError::NotFound(container.name.clone()))?;
        entry.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn signal(&self, container: &Container, signal: Signal) -> RuntimeResult<()> {
        self.enter(Call::Signal {
            container: container.name.clone(),
            signal,
        })
        .await?;

        let mut state = self.state();
        let entry = state
            .containers
            .get_mut(&container.name)
            .ok_or_else(|| RuntimeError::NotFound(container.name.clone()))?;
        if entry.address.is_empty() {
            return Err(RuntimeError::Failed(format!(
                "container {} is not running",
                container.name
            )));
        }
        entry.signals.push(signal);
        Ok(())
    }

    async fn delete(&self, container: &Container) -> RuntimeResult<()> {
        self.enter(Call::Delete(container.name.clone())).await?;

        self.state()
            .containers
            .remove(&container.name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(container.name.clone()))
    }
}
