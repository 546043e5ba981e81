//! Runtime adapter error types.

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors reported by a container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("unexpected runtime output: {0}")]
    Parse(String),

    #[error("{0}")]
    Failed(String),
}
