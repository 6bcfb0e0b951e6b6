//! Error types for rtlog-core operations.

use std::path::PathBuf;

/// All errors that can occur in rtlog-core operations.
///
/// Errors local to a single metadata line (`Parse`, `Schema`) are recoverable; readers
/// yield them per line and keep going. Everything touching session identity or
/// on-disk layout is fatal for the invoking command.
#[derive(Debug, thiserror::Error)]
pub enum RtlogError {
    // ─────────────────────────────────────────────────────────────────────
    // Session Lifecycle Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session directory {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Required command `{name}` not found ({hint})")]
    MissingDependency { name: String, hint: String },

    #[error("A session is already active: {directory} (Session ID: {session_id}, PID: {pid})")]
    StateConflict {
        directory: PathBuf,
        session_id: String,
        pid: u32,
    },

    #[error("Active session record is corrupt: {location}: {details}")]
    Corrupt { location: String, details: String },

    #[error("Invalid active session record: {0}")]
    InvalidRecord(String),

    #[error("No such process: {0}")]
    NoSuchProcess(u32),

    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Terminal capture failed: {0}")]
    Capture(String),

    // ─────────────────────────────────────────────────────────────────────
    // Metadata / Export Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Malformed JSON on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line} is JSON but not a valid record: {source}")]
    Schema {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Input file {0} does not exist")]
    InputNotFound(PathBuf),

    #[error("{0} is not a file")]
    NotAFile(PathBuf),

    #[error("Error writing {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RtlogError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RtlogError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        RtlogError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using RtlogError.
pub type Result<T> = std::result::Result<T, RtlogError>;
