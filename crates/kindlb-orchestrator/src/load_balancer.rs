//! The load-balancer state machine for a single cluster.
//!
//! ```text
//!            create()                 delete()
//!   Absent ───────────► Provisioned ───────────► Absent
//!                        │  ▲
//!                        └──┘ update_configuration(), ip()
//! ```
//!
//! The attached container handle changes only after the runtime confirms a
//! create or delete, so a failed or cancelled call leaves the state as it
//! was and the caller can simply retry.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kindlb_core::{
    BackendSet, ClusterConfig, ImageDefaults, KindlbConfig, CONTROL_PLANE_PORT,
    LOAD_BALANCER_LISTEN_ADDRESS,
};
use kindlb_render::{ConfigData, ConfigRenderer, HaproxyRenderer};
use kindlb_runtime::{Container, CreateLoadBalancer, RuntimeAdapter, RuntimeResult};

use crate::cancel::cancellable;
use crate::discovery::Discovery;
use crate::error::{LoadBalancerError, LoadBalancerResult};

/// Collaborators and defaults shared by every cluster's load balancer.
#[derive(Clone)]
pub struct LoadBalancerContext {
    pub runtime: Arc<dyn RuntimeAdapter>,
    pub renderer: Arc<dyn ConfigRenderer>,
    pub image_defaults: ImageDefaults,
    pub config_data: ConfigData,
}

impl LoadBalancerContext {
    /// HAProxy rendering with the built-in image defaults.
    pub fn new(runtime: Arc<dyn RuntimeAdapter>) -> Self {
        Self {
            runtime,
            renderer: Arc::new(HaproxyRenderer::new()),
            image_defaults: ImageDefaults::default(),
            config_data: ConfigData::default(),
        }
    }

    /// Image defaults and render options taken from a `kindlb.toml`.
    pub fn from_config(runtime: Arc<dyn RuntimeAdapter>, config: &KindlbConfig) -> Self {
        Self::new(runtime)
            .with_image_defaults(config.image.clone())
            .with_config_data(ConfigData::from(&config.render))
    }

    /// Replace the HAProxy renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn ConfigRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Image used by clusters without an override.
    pub fn with_image_defaults(mut self, defaults: ImageDefaults) -> Self {
        self.image_defaults = defaults;
        self
    }

    /// Options passed to every render.
    pub fn with_config_data(mut self, data: ConfigData) -> Self {
        self.config_data = data;
        self
    }
}

/// Result of a successful configuration update.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    /// The backend set the written config was rendered from.
    pub backends: BackendSet,
    /// Size of the written document.
    pub bytes: usize,
}

/// Snapshot of a load balancer's state for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerStatus {
    pub cluster: String,
    pub container: String,
    pub image: String,
    pub provisioned: bool,
}

/// Manages the external load-balancer container of one cluster.
pub struct LoadBalancer {
    cluster: String,
    image: String,
    container: Option<Container>,
    runtime: Arc<dyn RuntimeAdapter>,
    renderer: Arc<dyn ConfigRenderer>,
    discovery: Discovery,
    config_data: ConfigData,
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("cluster", &self.cluster)
            .field("image", &self.image)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl LoadBalancer {
    /// Look up the load balancer of `cluster`.
    ///
    /// An existing container is attached whether or not it is running; a
    /// stopped one simply has no address. Nothing is created.
    pub async fn new(
        ctx: &LoadBalancerContext,
        cluster: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<Self> {
        if cluster.name.is_empty() {
            return Err(LoadBalancerError::InvalidArgument(
                "create load balancer: cluster name is empty".to_string(),
            ));
        }

        let mut lb = Self {
            cluster: cluster.name.clone(),
            image: cluster.resolve_image(&ctx.image_defaults),
            container: None,
            runtime: Arc::clone(&ctx.runtime),
            renderer: Arc::clone(&ctx.renderer),
            discovery: Discovery::new(Arc::clone(&ctx.runtime)),
            config_data: ctx.config_data.clone(),
        };

        let container_name = lb.container_name();
        lb.container = lb
            .call(
                cancel,
                "discover load balancer",
                &container_name,
                lb.discovery.load_balancer(&lb.cluster),
            )
            .await?;

        debug!(
            cluster = %lb.cluster,
            image = %lb.image,
            found = lb.container.is_some(),
            "load balancer looked up"
        );
        Ok(lb)
    }

    /// Name of the cluster this load balancer fronts.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Image the container is (or will be) created from.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Name of the load-balancer container, `<cluster>-lb`.
    pub fn container_name(&self) -> String {
        format!("{}-lb", self.cluster)
    }

    /// The attached container, if provisioned.
    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Whether a container is attached.
    pub fn is_provisioned(&self) -> bool {
        self.container.is_some()
    }

    /// Snapshot for reporting; makes no runtime calls.
    pub fn status(&self) -> LoadBalancerStatus {
        LoadBalancerStatus {
            cluster: self.cluster.clone(),
            container: self
                .container
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| self.container_name()),
            image: self.image.clone(),
            provisioned: self.is_provisioned(),
        }
    }

    /// Re-resolve the image from the latest cluster settings.
    ///
    /// Applied only while no container is attached. An existing container
    /// keeps its image until it is deleted and created again.
    pub fn refresh_image(&mut self, image: String) {
        if image == self.image {
            return;
        }
        if let Some(container) = &self.container {
            warn!(
                cluster = %self.cluster,
                container = %container,
                current = %self.image,
                requested = %image,
                "image change ignored for existing load balancer, delete it to apply"
            );
            return;
        }
        debug!(cluster = %self.cluster, from = %self.image, to = %image, "load balancer image updated");
        self.image = image;
    }

    /// Create the load-balancer container if it does not exist yet.
    pub async fn create(&mut self, cancel: &CancellationToken) -> LoadBalancerResult<()> {
        if self.container.is_some() {
            debug!(cluster = %self.cluster, "load balancer already exists");
            return Ok(());
        }

        let request = CreateLoadBalancer {
            name: self.container_name(),
            image: self.image.clone(),
            cluster: self.cluster.clone(),
            listen_address: LOAD_BALANCER_LISTEN_ADDRESS.to_string(),
            port: 0,
        };
        info!(cluster = %self.cluster, container = %request.name, image = %request.image, "creating load balancer container");

        let container = self
            .call(
                cancel,
                "create load balancer",
                &request.name,
                self.runtime.create_load_balancer(&request),
            )
            .await?;

        info!(cluster = %self.cluster, container = %container, "load balancer container created");
        self.container = Some(container);
        Ok(())
    }

    /// Point the load balancer at the cluster's current control-plane nodes.
    ///
    /// The full config is rendered from every discovered node and written
    /// before the reload is triggered. If any node cannot be resolved or
    /// the write fails, nothing is reloaded and the previous config stays
    /// in force. A failed reload after a successful write is reported; the
    /// next successful update reloads again.
    pub async fn update_configuration(
        &mut self,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<ConfigUpdate> {
        let container = self.require_container()?.clone();

        let nodes = self
            .call(
                cancel,
                "discover control-plane nodes",
                &container.name,
                self.discovery.control_plane_nodes(&self.cluster),
            )
            .await?;

        let backends = self
            .discovery
            .resolve_backends(&self.cluster, &nodes, CONTROL_PLANE_PORT, cancel)
            .await?;

        let config = self
            .renderer
            .render(&backends, &self.config_data)
            .map_err(|source| LoadBalancerError::Render {
                cluster: self.cluster.clone(),
                source,
            })?;

        let path = self.renderer.config_path().to_string();
        info!(
            cluster = %self.cluster,
            container = %container,
            backends = backends.len(),
            %path,
            "updating load balancer configuration"
        );
        self.call(
            cancel,
            "write load balancer config",
            &container.name,
            self.runtime.write_file(&container, &path, &config),
        )
        .await?;

        self.call(
            cancel,
            "reload load balancer",
            &container.name,
            self.runtime.trigger_reload(&container),
        )
        .await?;

        debug!(cluster = %self.cluster, endpoints = ?backends.endpoints(), "load balancer reloaded");
        Ok(ConfigUpdate {
            backends,
            bytes: config.len(),
        })
    }

    /// Address of the load-balancer container.
    ///
    /// A container that exists but reports no address (typically because it
    /// is stopped) yields [`LoadBalancerError::AddressUnavailable`].
    pub async fn ip(&self, cancel: &CancellationToken) -> LoadBalancerResult<String> {
        let container = self.require_container()?;

        let address = self
            .call(
                cancel,
                "read load balancer address",
                &container.name,
                self.runtime.address(container),
            )
            .await?;

        if address.is_empty() {
            return Err(LoadBalancerError::AddressUnavailable {
                cluster: self.cluster.clone(),
                container: container.name.clone(),
            });
        }
        Ok(address)
    }

    /// Remove the load-balancer container. A no-op when none is attached.
    ///
    /// The handle stays attached if the runtime reports an error, so a
    /// retry reissues the same deletion.
    pub async fn delete(&mut self, cancel: &CancellationToken) -> LoadBalancerResult<()> {
        let Some(container) = self.container.clone() else {
            warn!(cluster = %self.cluster, "no load balancer to delete");
            return Ok(());
        };

        info!(cluster = %self.cluster, container = %container, "deleting load balancer container");
        self.call(
            cancel,
            "delete load balancer",
            &container.name,
            self.runtime.delete(&container),
        )
        .await?;

        self.container = None;
        info!(cluster = %self.cluster, "load balancer container deleted");
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn require_container(&self) -> LoadBalancerResult<&Container> {
        self.container
            .as_ref()
            .ok_or_else(|| LoadBalancerError::NotProvisioned {
                cluster: self.cluster.clone(),
            })
    }

    /// Await a runtime call under `cancel`, attaching operation context to
    /// any failure.
    async fn call<T>(
        &self,
        cancel: &CancellationToken,
        operation: &'static str,
        container: &str,
        fut: impl Future<Output = RuntimeResult<T>>,
    ) -> LoadBalancerResult<T> {
        match cancellable(cancel, fut).await {
            None => Err(LoadBalancerError::Cancelled {
                operation,
                cluster: self.cluster.clone(),
            }),
            Some(result) => result.map_err(|source| LoadBalancerError::AdapterFailure {
                operation,
                cluster: self.cluster.clone(),
                container: container.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindlb_core::NodeRole;
    use kindlb_runtime::{Call, InMemoryRuntime, Operation, Signal};

    fn context(runtime: &InMemoryRuntime) -> LoadBalancerContext {
        LoadBalancerContext::new(Arc::new(runtime.clone()))
    }

    async fn load(runtime: &InMemoryRuntime, cluster: &str) -> LoadBalancer {
        LoadBalancer::new(
            &context(runtime),
            &ClusterConfig::new(cluster),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn empty_cluster_name_is_rejected() {
        let runtime = InMemoryRuntime::new();
        let result = LoadBalancer::new(
            &context(&runtime),
            &ClusterConfig::new(""),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(LoadBalancerError::InvalidArgument(_))));
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn construct_resolves_default_image() {
        let runtime = InMemoryRuntime::new();
        let lb = load(&runtime, "demo").await;
        assert_eq!(lb.image(), "kindest/haproxy:v20230510-486859a6");
        assert_eq!(lb.container_name(), "demo-lb");
        assert!(!lb.is_provisioned());
    }

    #[tokio::test]
    async fn construct_uses_injected_defaults_and_override() {
        let runtime = InMemoryRuntime::new();
        let ctx = context(&runtime).with_image_defaults(ImageDefaults {
            repository: "mirror.local".to_string(),
            name: "lb".to_string(),
            tag: "1".to_string(),
        });
        let cancel = CancellationToken::new();

        let lb = LoadBalancer::new(&ctx, &ClusterConfig::new("demo"), &cancel)
            .await
            .unwrap();
        assert_eq!(lb.image(), "mirror.local/lb:1");

        let cluster = ClusterConfig::new("demo").with_load_balancer_image("custom/haproxy:2");
        let lb = LoadBalancer::new(&ctx, &cluster, &cancel).await.unwrap();
        assert_eq!(lb.image(), "custom/haproxy:2");
    }

    #[tokio::test]
    async fn construct_attaches_existing_container_without_creating() {
        let runtime = InMemoryRuntime::new();
        runtime.add_node("demo", NodeRole::ExternalLoadBalancer, "demo-lb", "172.18.0.2");

        let lb = load(&runtime, "demo").await;
        assert!(lb.is_provisioned());
        assert_eq!(lb.container().map(|c| c.name.as_str()), Some("demo-lb"));
        assert_eq!(runtime.count(Operation::Create), 0);

        match &runtime.calls()[0] {
            Call::List(filter) => {
                assert_eq!(
                    filter,
                    &kindlb_core::LabelFilter::cluster_role("demo", NodeRole::ExternalLoadBalancer)
                );
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn construct_surfaces_discovery_failure() {
        let runtime = InMemoryRuntime::new();
        runtime.fail_next(Operation::List, "daemon unreachable");
        let result = LoadBalancer::new(
            &context(&runtime),
            &ClusterConfig::new("demo"),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(LoadBalancerError::AdapterFailure { operation: "discover load balancer", .. })
        ));
    }

    #[tokio::test]
    async fn create_issues_expected_request() {
        let runtime = InMemoryRuntime::new();
        let mut lb = load(&runtime, "demo").await;
        lb.create(&CancellationToken::new()).await.unwrap();

        let creates = runtime.calls_of(Operation::Create);
        assert_eq!(
            creates,
            vec![Call::Create(CreateLoadBalancer {
                name: "demo-lb".to_string(),
                image: "kindest/haproxy:v20230510-486859a6".to_string(),
                cluster: "demo".to_string(),
                listen_address: "0.0.0.0".to_string(),
                port: 0,
            })]
        );
        assert!(lb.is_provisioned());
    }

    #[tokio::test]
    async fn create_failure_leaves_instance_absent() {
        let runtime = InMemoryRuntime::new();
        let mut lb = load(&runtime, "demo").await;
        runtime.fail_next(Operation::Create, "image pull failed");

        let err = lb.create(&CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("image pull failed"));
        assert!(err.to_string().contains("demo-lb"));
        assert!(!lb.is_provisioned());

        lb.create(&CancellationToken::new()).await.unwrap();
        assert!(lb.is_provisioned());
        assert_eq!(runtime.count(Operation::Create), 2);
    }

    #[tokio::test]
    async fn ip_on_absent_instance_is_not_provisioned() {
        let runtime = InMemoryRuntime::new();
        let lb = load(&runtime, "demo").await;
        runtime.clear_calls();

        let err = lb.ip(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_not_provisioned());
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn ip_lookup_failure_is_adapter_failure() {
        let runtime = InMemoryRuntime::new();
        runtime.add_node("demo", NodeRole::ExternalLoadBalancer, "demo-lb", "172.18.0.2");
        let lb = load(&runtime, "demo").await;
        runtime.fail_next(Operation::Address, "inspect failed");

        let err = lb.ip(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LoadBalancerError::AdapterFailure { .. }));
    }

    #[tokio::test]
    async fn update_signals_hangup_after_write() {
        let runtime = InMemoryRuntime::new();
        runtime.add_node("demo", NodeRole::ControlPlane, "demo-cp", "10.0.0.5");
        let mut lb = load(&runtime, "demo").await;
        lb.create(&CancellationToken::new()).await.unwrap();
        runtime.clear_calls();

        let update = lb.update_configuration(&CancellationToken::new()).await.unwrap();
        assert_eq!(update.backends.get("demo-cp"), Some("10.0.0.5:6443"));

        let ops: Vec<Operation> = runtime.calls().iter().map(Call::operation).collect();
        assert_eq!(
            ops,
            vec![
                Operation::List,
                Operation::Address,
                Operation::WriteFile,
                Operation::Signal
            ]
        );
        assert_eq!(runtime.signals("demo-lb"), vec![Signal::Hangup]);
    }

    #[tokio::test]
    async fn update_render_failure_writes_nothing() {
        let runtime = InMemoryRuntime::new();
        runtime.add_container(
            kindlb_runtime::Container::node("bad name", "demo", NodeRole::ControlPlane),
            "10.0.0.5",
        );
        let mut lb = load(&runtime, "demo").await;
        lb.create(&CancellationToken::new()).await.unwrap();

        let err = lb
            .update_configuration(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadBalancerError::Render { .. }));
        assert_eq!(runtime.count(Operation::WriteFile), 0);
        assert_eq!(runtime.count(Operation::Signal), 0);
    }

    #[tokio::test]
    async fn refresh_image_applies_only_while_absent() {
        let runtime = InMemoryRuntime::new();
        let mut lb = load(&runtime, "demo").await;

        lb.refresh_image("custom/lb:1".to_string());
        assert_eq!(lb.image(), "custom/lb:1");

        lb.create(&CancellationToken::new()).await.unwrap();
        lb.refresh_image("custom/lb:2".to_string());
        assert_eq!(lb.image(), "custom/lb:1");
    }

    #[tokio::test]
    async fn status_reports_state() {
        let runtime = InMemoryRuntime::new();
        let mut lb = load(&runtime, "demo").await;
        let status = lb.status();
        assert_eq!(status.container, "demo-lb");
        assert!(!status.provisioned);

        lb.create(&CancellationToken::new()).await.unwrap();
        assert!(lb.status().provisioned);
    }
}
