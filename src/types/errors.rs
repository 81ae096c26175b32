use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ScoutError>;

#[derive(Error, Debug)]
pub enum ScoutError {
    /// The executable could not be started at all. Distinct from a tool that
    /// ran and reported failure through its exit code.
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A hung tool is treated the same as one that failed to launch.
    #[error("`{program}` timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("`{tool}` exited with status {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("malformed tool output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to build `{tool}`: {stderr}")]
    Bootstrap { tool: String, stderr: String },

    #[error("failed to read configuration from {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
