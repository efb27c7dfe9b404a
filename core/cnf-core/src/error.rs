//! Error types for winget-cnf-core operations.
//!
//! Nothing in this crate lets these escape into the host's callback path; the
//! resolver and providers convert them into empty or synthetic results.

use std::path::PathBuf;

/// All errors that can occur in winget-cnf-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CnfError {
    // ─────────────────────────────────────────────────────────────────────
    // Environment Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Package manager executable not found: {0}")]
    NotInstalled(String),

    #[error("Failed to create query session: {0}")]
    SessionCreate(String),

    // ─────────────────────────────────────────────────────────────────────
    // Query Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Query failed: {command}: {details}")]
    QueryFailed { command: String, details: String },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Session has no pending query")]
    EmptyCommandBuffer,

    #[error("Malformed query output: {0}")]
    MalformedOutput(String),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using CnfError.
pub type Result<T> = std::result::Result<T, CnfError>;

impl From<CnfError> for String {
    fn from(err: CnfError) -> String {
        err.to_string()
    }
}
