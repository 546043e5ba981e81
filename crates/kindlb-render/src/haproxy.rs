//! HAProxy configuration for the external load balancer.
//!
//! The frontend listens on the control-plane port and forwards TCP to every
//! API server in the backend set. Backends are resolved through Docker's
//! embedded DNS so a restarted node keeps its entry.

use tracing::debug;

use kindlb_core::BackendSet;

use crate::{ConfigData, ConfigRenderer, RenderError, RenderResult};

/// Path of the HAProxy configuration inside the load-balancer image.
pub const HAPROXY_CONFIG_PATH: &str = "/usr/local/etc/haproxy/haproxy.cfg";

/// Port the stats frontend binds when enabled.
pub const STATS_PORT: u16 = 8404;

#[derive(Debug, Clone, Default)]
pub struct HaproxyRenderer;

impl HaproxyRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigRenderer for HaproxyRenderer {
    fn render(&self, backends: &BackendSet, data: &ConfigData) -> RenderResult<Vec<u8>> {
        for (name, endpoint) in backends.iter() {
            validate_token(name, name, "name")?;
            validate_token(name, endpoint, "endpoint")?;
        }

        let mut out = String::new();
        out.push_str("# generated by kindlb\n");
        out.push_str("global\n");
        out.push_str("  log /dev/log local0\n");
        out.push_str("  log /dev/log local1 notice\n");
        out.push_str("  daemon\n");
        out.push_str("  # limit memory usage to approximately 18 MB\n");
        out.push_str("  maxconn 100000\n");
        out.push('\n');

        out.push_str("resolvers docker\n");
        out.push_str("  nameserver dns 127.0.0.11:53\n");
        out.push('\n');

        out.push_str("defaults\n");
        out.push_str("  log global\n");
        out.push_str("  mode tcp\n");
        out.push_str("  option dontlognull\n");
        out.push_str("  timeout connect 5000\n");
        out.push_str("  timeout client 50000\n");
        out.push_str("  timeout server 50000\n");
        out.push_str("  # allow to boot despite dns don't resolve backends\n");
        out.push_str("  default-server init-addr none\n");
        out.push('\n');

        if data.enable_stats {
            out.push_str("frontend stats\n");
            out.push_str("  mode http\n");
            out.push_str(&format!("  bind *:{STATS_PORT}\n"));
            out.push_str("  stats enable\n");
            out.push_str("  stats uri /stats\n");
            out.push_str("  stats refresh 10s\n");
            out.push_str("  stats admin if TRUE\n");
            out.push('\n');
        }

        out.push_str("frontend control-plane\n");
        out.push_str(&format!("  bind *:{}\n", data.control_plane_port));
        if data.ipv6 {
            out.push_str(&format!("  bind :::{}\n", data.control_plane_port));
        }
        out.push_str("  default_backend kube-apiservers\n");
        out.push('\n');

        let family = if data.ipv6 { "ipv6" } else { "ipv4" };
        out.push_str("backend kube-apiservers\n");
        out.push_str("  option httpchk GET /healthz\n");
        for (name, endpoint) in backends.iter() {
            out.push_str(&format!(
                "  server {name} {endpoint} check check-ssl verify none resolvers docker resolve-prefer {family}\n"
            ));
        }

        debug!(backends = backends.len(), bytes = out.len(), "rendered haproxy config");
        Ok(out.into_bytes())
    }

    fn config_path(&self) -> &str {
        HAPROXY_CONFIG_PATH
    }
}

/// Reject values that would break the line-oriented config format.
fn validate_token(name: &str, value: &str, field: &str) -> RenderResult<()> {
    if value.is_empty() {
        return Err(RenderError::InvalidBackend {
            name: name.to_string(),
            reason: format!("empty {field}"),
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RenderError::InvalidBackend {
            name: name.to_string(),
            reason: format!("{field} contains whitespace"),
        });
    }
    Ok(())
}
