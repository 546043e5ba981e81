use anyhow::{bail, Context};

use kindlb_core::{BackendRecord, BackendSet, KindlbConfig, CONTROL_PLANE_PORT};
use kindlb_render::{ConfigData, ConfigRenderer, HaproxyRenderer};

pub fn render(config: &KindlbConfig, backends: &[String]) -> anyhow::Result<()> {
    let set = parse_backends(backends)?;
    let bytes = HaproxyRenderer::new()
        .render(&set, &ConfigData::from(&config.render))
        .context("rendering load balancer config")?;
    print!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}

/// Parse `NAME=HOST` pairs into a backend set on the control-plane port.
fn parse_backends(specs: &[String]) -> anyhow::Result<BackendSet> {
    let mut records = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some((name, host)) = spec.split_once('=') else {
            bail!("invalid backend {spec:?}: expected NAME=HOST");
        };
        if name.is_empty() || host.is_empty() {
            bail!("invalid backend {spec:?}: name and host must be non-empty");
        }
        records.push(BackendRecord::new(name, host, CONTROL_PLANE_PORT));
    }
    Ok(records.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_name_host_pairs() {
        let set = parse_backends(&specs(&["a=10.0.0.1", "b=fc00::2"])).unwrap();
        assert_eq!(set.get("a"), Some("10.0.0.1:6443"));
        assert_eq!(set.get("b"), Some("[fc00::2]:6443"));
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_backends(&specs(&["a"])).is_err());
        assert!(parse_backends(&specs(&["=10.0.0.1"])).is_err());
        assert!(parse_backends(&specs(&["a="])).is_err());
    }

    #[test]
    fn renders_with_no_backends() {
        render(&KindlbConfig::default(), &[]).unwrap();
    }
}
