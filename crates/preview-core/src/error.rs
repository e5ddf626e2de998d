// src/error.rs
use thiserror::Error;

/// Error hierarchy for the preview pipeline
/// Covers helper process management, helper HTTP traffic, malformed data and the host bridge.
/// Component boundaries that promise a value convert these into safe defaults.
#[derive(Error, Debug)]
pub enum PreviewError {
    // Helper Process Errors
    #[error("Helper root could not be resolved")]
    HelperRootUnresolved,

    #[error("No runnable helper found under {root}")]
    HelperCommandNotFound { root: String },

    #[error("No free port available starting at {start}")]
    PortExhausted { start: u16 },

    #[error("Failed to spawn helper process: {program}: {message}")]
    ProcessSpawnFailed { program: String, message: String },

    #[error("Helper is not running")]
    HelperNotRunning,

    #[error("Helper did not answer within {timeout_ms}ms")]
    HelperNotReady { timeout_ms: u64 },

    // Helper HTTP Errors
    #[error("Helper request to {endpoint} failed: {message}")]
    HelperRequest { endpoint: String, message: String },

    #[error("Helper returned status {status} for {endpoint}")]
    HelperStatus { endpoint: String, status: u16 },

    // Data Errors
    #[error("Malformed {what}: {message}")]
    MalformedData { what: String, message: String },

    #[error("Invalid data URI: {message}")]
    InvalidDataUri { message: String },

    // Host Collaborator Errors
    #[error("Host call failed: {message}")]
    Host { message: String },

    #[error("No font selected")]
    NoSelection,

    // Configuration Errors
    #[error("Invalid configuration: {field} = {value}")]
    ConfigurationError { field: String, value: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl PreviewError {
    /// Build a `MalformedData` error from a serde failure
    pub fn malformed(what: &str, err: impl std::fmt::Display) -> Self {
        Self::MalformedData {
            what: what.to_string(),
            message: err.to_string(),
        }
    }
}

pub type PreviewResult<T> = Result<T, PreviewError>;
