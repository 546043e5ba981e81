//! kindlb.toml configuration parser.
//!
//! Every section is optional; missing fields fall back to the built-in
//! defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default load-balancer image repository.
pub const DEFAULT_IMAGE_REPOSITORY: &str = "kindest";

/// Default load-balancer image name.
pub const DEFAULT_IMAGE_NAME: &str = "haproxy";

/// Default load-balancer image tag.
pub const DEFAULT_IMAGE_TAG: &str = "v20230510-486859a6";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindlbConfig {
    pub image: ImageDefaults,
    pub render: RenderConfig,
    pub docker: DockerConfig,
}

/// Image used for a load balancer when the cluster has no override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDefaults {
    pub repository: String,
    pub name: String,
    pub tag: String,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            repository: DEFAULT_IMAGE_REPOSITORY.to_string(),
            name: DEFAULT_IMAGE_NAME.to_string(),
            tag: DEFAULT_IMAGE_TAG.to_string(),
        }
    }
}

impl ImageDefaults {
    /// Full image reference, e.g. `kindest/haproxy:v20230510-486859a6`.
    pub fn reference(&self) -> String {
        format!("{}/{}:{}", self.repository, self.name, self.tag)
    }
}

/// Options passed to the config renderer on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enable_stats: bool,
    pub ipv6: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enable_stats: true,
            ipv6: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Path or name of the docker CLI.
    pub binary: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl KindlbConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Per-cluster settings handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    /// Overrides the default image when set and non-empty.
    #[serde(default)]
    pub load_balancer_image: Option<String>,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            load_balancer_image: None,
        }
    }

    pub fn with_load_balancer_image(mut self, image: impl Into<String>) -> Self {
        self.load_balancer_image = Some(image.into());
        self
    }

    /// The image to run: the override if present, else the defaults.
    pub fn resolve_image(&self, defaults: &ImageDefaults) -> String {
        match self.load_balancer_image.as_deref() {
            Some(image) if !image.is_empty() => image.to_string(),
            _ => defaults.reference(),
        }
    }
}
