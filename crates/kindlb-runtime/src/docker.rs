//! Docker CLI runtime adapter.
//!
//! Each operation shells out to the `docker` binary. Child processes are
//! spawned with `kill_on_drop`, so dropping an operation's future (on
//! cancellation) also stops the command.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use kindlb_core::{LabelFilter, NodeRole, CLUSTER_LABEL_KEY, CONTROL_PLANE_PORT, NODE_ROLE_LABEL_KEY};

use crate::adapter::{CreateLoadBalancer, RuntimeAdapter};
use crate::container::{Container, Signal};
use crate::error::{RuntimeError, RuntimeResult};

/// Runtime adapter backed by the `docker` command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    ipv6: bool,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ipv6: false,
        }
    }

    /// Report global IPv6 addresses instead of IPv4 ones.
    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> RuntimeResult<String> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!(%command, "running docker command");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        // A command that exits early breaks the pipe; its exit status and
        // stderr explain why, so the write error is only reported when the
        // command itself succeeded.
        let mut write_error = None;
        if let (Some(content), Some(mut pipe)) = (stdin, child.stdin.take()) {
            if let Err(e) = pipe.write_all(content).await {
                write_error = Some(e);
            }
            // Closing stdin signals EOF to the command.
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::Command {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if let Some(source) = write_error {
            return Err(RuntimeError::Spawn { command, source });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RuntimeAdapter for DockerCli {
    async fn create_load_balancer(&self, request: &CreateLoadBalancer) -> RuntimeResult<Container> {
        self.run(&run_args(request), None).await?;
        Ok(Container::node(
            request.name.clone(),
            &request.cluster,
            NodeRole::ExternalLoadBalancer,
        ))
    }

    async fn list(&self, filter: &LabelFilter) -> RuntimeResult<Vec<Container>> {
        let stdout = self.run(&list_args(filter), None).await?;
        let containers = parse_names(&stdout)
            .into_iter()
            .map(|name| {
                filter
                    .predicates()
                    .fold(Container::new(name), |c, (k, v)| c.with_label(k, v))
            })
            .collect();
        Ok(containers)
    }

    async fn address(&self, container: &Container) -> RuntimeResult<String> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .NetworkSettings.Networks}}".to_string(),
            container.name.clone(),
        ];
        let stdout = self.run(&args, None).await?;
        parse_network_address(&stdout, self.ipv6)
    }

    async fn write_file(&self, container: &Container, path: &str, content: &[u8]) -> RuntimeResult<()> {
        let args = vec![
            "exec".to_string(),
            "--interactive".to_string(),
            container.name.clone(),
            "cp".to_string(),
            "/dev/stdin".to_string(),
            path.to_string(),
        ];
        self.run(&args, Some(content)).await?;
        Ok(())
    }

    async fn signal(&self, container: &Container, signal: Signal) -> RuntimeResult<()> {
        let args = vec![
            "kill".to_string(),
            "--signal".to_string(),
            signal.as_str().to_string(),
            container.name.clone(),
        ];
        self.run(&args, None).await?;
        Ok(())
    }

    async fn delete(&self, container: &Container) -> RuntimeResult<()> {
        let args = vec![
            "rm".to_string(),
            "--force".to_string(),
            "--volumes".to_string(),
            container.name.clone(),
        ];
        self.run(&args, None).await?;
        Ok(())
    }
}

/// Arguments for `docker run` creating a load-balancer container.
fn run_args(request: &CreateLoadBalancer) -> Vec<String> {
    let host_port = if request.port == 0 {
        String::new()
    } else {
        request.port.to_string()
    };
    vec![
        "run".to_string(),
        "--detach".to_string(),
        "--tty".to_string(),
        "--label".to_string(),
        format!("{CLUSTER_LABEL_KEY}={}", request.cluster),
        "--label".to_string(),
        format!("{NODE_ROLE_LABEL_KEY}={}", NodeRole::ExternalLoadBalancer),
        "--hostname".to_string(),
        request.name.clone(),
        "--name".to_string(),
        request.name.clone(),
        "--publish".to_string(),
        format!(
            "{}:{}:{}/TCP",
            request.listen_address, host_port, CONTROL_PLANE_PORT
        ),
        request.image.clone(),
    ]
}

/// Arguments for `docker ps` listing containers that match `filter`.
fn list_args(filter: &LabelFilter) -> Vec<String> {
    let mut args = vec![
        "ps".to_string(),
        "--all".to_string(),
        "--no-trunc".to_string(),
    ];
    for (key, value) in filter.predicates() {
        args.push("--filter".to_string());
        args.push(format!("label={key}={value}"));
    }
    args.push("--format".to_string());
    args.push("{{.Names}}".to_string());
    args
}

fn parse_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct NetworkEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
    #[serde(rename = "GlobalIPv6Address", default)]
    global_ipv6_address: String,
}

/// Pick the first non-empty address from `docker inspect` network JSON.
///
/// A stopped container still lists its networks but with empty addresses,
/// which yields `""`.
fn parse_network_address(stdout: &str, ipv6: bool) -> RuntimeResult<String> {
    let networks: Option<BTreeMap<String, NetworkEndpoint>> =
        serde_json::from_str(stdout.trim()).map_err(|e| RuntimeError::Parse(e.to_string()))?;

    let address = networks
        .unwrap_or_default()
        .into_values()
        .map(|n| if ipv6 { n.global_ipv6_address } else { n.ip_address })
        .find(|addr| !addr.is_empty())
        .unwrap_or_default();
    Ok(address)
}
