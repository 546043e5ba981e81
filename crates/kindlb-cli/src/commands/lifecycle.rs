use std::sync::Arc;

use tracing::info;

use kindlb_core::{ClusterConfig, KindlbConfig};
use kindlb_orchestrator::{CancellationToken, LoadBalancerContext, LoadBalancerRegistry};
use kindlb_runtime::{DockerCli, InMemoryRuntime, RuntimeAdapter};

/// Everything one command invocation needs.
struct Session {
    registry: LoadBalancerRegistry,
    cancel: CancellationToken,
    recorder: Option<InMemoryRuntime>,
}

impl Session {
    fn new(config: &KindlbConfig, dry_run: bool) -> Self {
        let (runtime, recorder): (Arc<dyn RuntimeAdapter>, _) = if dry_run {
            let memory = InMemoryRuntime::new();
            (Arc::new(memory.clone()), Some(memory))
        } else {
            let docker = DockerCli::new(config.docker.binary.clone()).with_ipv6(config.render.ipv6);
            (Arc::new(docker), None)
        };

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling");
                on_interrupt.cancel();
            }
        });

        Self {
            registry: LoadBalancerRegistry::new(LoadBalancerContext::from_config(runtime, config)),
            cancel,
            recorder,
        }
    }

    /// Log the runtime requests a dry run would have issued.
    fn finish(&self) {
        if let Some(recorder) = &self.recorder {
            for call in recorder.calls() {
                info!(?call, "dry run: runtime request");
            }
        }
    }
}

pub async fn create(
    config: &KindlbConfig,
    dry_run: bool,
    cluster: &str,
    image: Option<String>,
) -> anyhow::Result<()> {
    let session = Session::new(config, dry_run);
    let mut target = ClusterConfig::new(cluster);
    if let Some(image) = image {
        target = target.with_load_balancer_image(image);
    }

    let result = session.registry.create(&target, &session.cancel).await;
    session.finish();
    result?;
    println!("✓ Load balancer for cluster {cluster} is ready");
    Ok(())
}

pub async fn update(config: &KindlbConfig, dry_run: bool, cluster: &str) -> anyhow::Result<()> {
    let session = Session::new(config, dry_run);
    let result = session
        .registry
        .update_configuration(&ClusterConfig::new(cluster), &session.cancel)
        .await;
    session.finish();
    let update = result?;
    println!(
        "✓ Load balancer for cluster {cluster} now routes to {} backend(s)",
        update.backends.len()
    );
    for (name, endpoint) in update.backends.iter() {
        println!("  {name} → {endpoint}");
    }
    Ok(())
}

pub async fn ip(config: &KindlbConfig, dry_run: bool, cluster: &str) -> anyhow::Result<()> {
    let session = Session::new(config, dry_run);
    let result = session
        .registry
        .ip(&ClusterConfig::new(cluster), &session.cancel)
        .await;
    session.finish();
    println!("{}", result?);
    Ok(())
}

pub async fn delete(config: &KindlbConfig, dry_run: bool, cluster: &str) -> anyhow::Result<()> {
    let session = Session::new(config, dry_run);
    let result = session
        .registry
        .delete(&ClusterConfig::new(cluster), &session.cancel)
        .await;
    session.finish();
    result?;
    println!("✓ Load balancer for cluster {cluster} removed");
    Ok(())
}

pub async fn status(config: &KindlbConfig, dry_run: bool, cluster: &str) -> anyhow::Result<()> {
    let session = Session::new(config, dry_run);
    let result = session
        .registry
        .status(&ClusterConfig::new(cluster), &session.cancel)
        .await;
    session.finish();
    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_create_and_delete_succeed() {
        let config = KindlbConfig::default();
        create(&config, true, "demo", None).await.unwrap();
        delete(&config, true, "demo").await.unwrap();
        status(&config, true, "demo").await.unwrap();
    }

    #[tokio::test]
    async fn dry_run_update_without_load_balancer_fails() {
        let err = update(&KindlbConfig::default(), true, "demo").await.unwrap_err();
        assert!(err.to_string().contains("not provisioned"));
    }

    #[tokio::test]
    async fn empty_cluster_name_is_rejected() {
        let err = ip(&KindlbConfig::default(), true, "").await.unwrap_err();
        assert!(err.to_string().contains("cluster name is empty"));
    }
}
