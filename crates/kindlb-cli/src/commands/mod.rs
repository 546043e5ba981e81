pub mod config;
pub mod lifecycle;
pub mod render;

use std::path::Path;

use anyhow::Context;

use kindlb_core::KindlbConfig;

/// Load `kindlb.toml`, or the built-in defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<KindlbConfig> {
    match path {
        Some(path) => KindlbConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(KindlbConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), KindlbConfig::default());
    }

    #[test]
    fn reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[docker]\nbinary = \"podman\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.docker.binary, "podman");
    }

    #[test]
    fn unreadable_path_names_the_file() {
        let err = load_config(Some(Path::new("/nonexistent/kindlb.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/kindlb.toml"));
    }
}
