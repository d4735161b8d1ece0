//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a page
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be built or resolved (no source, bad paper format, ...)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The rendering environment could not be started
    #[error("Failed to launch rendering environment: {0}")]
    Launch(String),

    /// Navigation failed for a reason other than running out of time
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The page did not finish loading within the navigation budget
    #[error("Navigation timed out after {0}ms")]
    NavigationTimeout(u64),

    /// The readiness selector never matched a visible element
    #[error("Timed out after {timeout_ms}ms waiting for visible element `{selector}`")]
    ReadinessTimeout { selector: String, timeout_ms: u64 },

    /// The engine rejected or failed the screenshot/document render
    #[error("Artifact production failed: {0}")]
    ArtifactProduction(String),

    /// The produced bytes could not be written to the sink
    #[error("Failed to write output to {target}: {source}")]
    OutputWrite {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error was caused by a phase running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::NavigationTimeout(_) | Error::ReadinessTimeout { .. })
    }
}
