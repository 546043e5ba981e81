//! Per-cluster registry of load balancers.
//!
//! Reconcilers for different triggers may act on the same cluster at the
//! same time. The registry keeps one [`LoadBalancer`] per cluster behind its
//! own mutex, so operations on one cluster run strictly one after another
//! while different clusters proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OnceCell, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kindlb_core::ClusterConfig;

use crate::error::LoadBalancerResult;
use crate::load_balancer::{ConfigUpdate, LoadBalancer, LoadBalancerContext, LoadBalancerStatus};

/// A cluster's load balancer, looked up on first use.
type Slot = Arc<OnceCell<Mutex<LoadBalancer>>>;

pub struct LoadBalancerRegistry {
    ctx: LoadBalancerContext,
    /// Tracked clusters: cluster name → slot.
    slots: RwLock<HashMap<String, Slot>>,
}

impl LoadBalancerRegistry {
    pub fn new(ctx: LoadBalancerContext) -> Self {
        Self {
            ctx,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, cluster: &ClusterConfig, cancel: &CancellationToken) -> LoadBalancerResult<()> {
        let slot = self.slot(&cluster.name).await;
        self.acquire(&slot, cluster, cancel).await?.create(cancel).await
    }

    pub async fn update_configuration(
        &self,
        cluster: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<ConfigUpdate> {
        let slot = self.slot(&cluster.name).await;
        self.acquire(&slot, cluster, cancel).await?.update_configuration(cancel).await
    }

    pub async fn ip(&self, cluster: &ClusterConfig, cancel: &CancellationToken) -> LoadBalancerResult<String> {
        let slot = self.slot(&cluster.name).await;
        self.acquire(&slot, cluster, cancel).await?.ip(cancel).await
    }

    pub async fn delete(&self, cluster: &ClusterConfig, cancel: &CancellationToken) -> LoadBalancerResult<()> {
        let slot = self.slot(&cluster.name).await;
        self.acquire(&slot, cluster, cancel).await?.delete(cancel).await
    }

    pub async fn status(
        &self,
        cluster: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<LoadBalancerStatus> {
        let slot = self.slot(&cluster.name).await;
        Ok(self.acquire(&slot, cluster, cancel).await?.status())
    }

    /// Stop tracking a cluster. The next operation looks it up again.
    pub async fn forget(&self, cluster: &str) -> bool {
        let removed = self.slots.write().await.remove(cluster).is_some();
        if removed {
            debug!(%cluster, "load balancer forgotten");
        }
        removed
    }

    /// Names of all tracked clusters.
    pub async fn clusters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn slot(&self, cluster: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(cluster) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(cluster.to_string()).or_default())
    }

    /// Lock the cluster's load balancer, applying the caller's current
    /// image settings to a not-yet-provisioned instance.
    async fn acquire<'s>(
        &self,
        slot: &'s Slot,
        cluster: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<MutexGuard<'s, LoadBalancer>> {
        let mut lb = self.load(slot, cluster, cancel).await?.lock().await;
        lb.refresh_image(cluster.resolve_image(&self.ctx.image_defaults));
        Ok(lb)
    }

    /// Construct the cluster's load balancer on first use. Concurrent
    /// callers wait for a single lookup; a failed lookup leaves the slot
    /// empty for the next caller.
    async fn load<'s>(
        &self,
        slot: &'s Slot,
        cluster: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> LoadBalancerResult<&'s Mutex<LoadBalancer>> {
        slot.get_or_try_init(|| async {
            let lb = LoadBalancer::new(&self.ctx, cluster, cancel).await?;
            Ok(Mutex::new(lb))
        })
        .await
    }
}
