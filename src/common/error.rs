//! Error types for the FTP conformance harness
//!
//! Every error carries enough context to tell whether the server under test,
//! the harness configuration, or the test files are at fault.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code used whenever a run is aborted by an error
pub const ERROR_EXIT_CODE: i32 = 2;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Usage Errors ===
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Server binary '{0}' not found")]
    BinaryNotFound(String),

    #[error("Server binary '{0}' is not executable")]
    BinaryNotExecutable(String),

    // === Startup Errors ===
    #[error("Failed to start server: {0}")]
    StartupFailed(String),

    #[error("Server failed to start ({status}), try changing your port")]
    ServerExited { status: String },

    #[error("Server did not accept connections on {addr} within {secs} seconds")]
    ServerNotReady { addr: String, secs: u64 },

    // === Communication Errors ===
    #[error("Could not connect to {addr} after {attempts} attempts: {source}")]
    ConnectFailed {
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("Timed out after {0} seconds waiting for a response line")]
    ReadTimeout(u64),

    #[error("Server closed the connection before sending a complete line")]
    ConnectionClosed,

    #[error("Communication error: {0}")]
    Communication(String),

    // === Test File Errors ===
    #[error("Configuration file '{name}' not found in {dir}")]
    ConfigNotFound { name: String, dir: String },

    #[error("Test case '{0}' contains no commands")]
    EmptyTest(String),

    // === Harness Configuration / IO Errors ===
    #[error("Invalid harness configuration: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of errors, used for reporting and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Startup,
    Communication,
    ConfigNotFound,
    EmptyTest,
    Io,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Usage(_) | Error::BinaryNotFound(_) | Error::BinaryNotExecutable(_) => {
                ErrorKind::Usage
            }
            Error::StartupFailed(_) | Error::ServerExited { .. } | Error::ServerNotReady { .. } => {
                ErrorKind::Startup
            }
            Error::ConnectFailed { .. }
            | Error::ReadTimeout(_)
            | Error::ConnectionClosed
            | Error::Communication(_) => ErrorKind::Communication,
            Error::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            Error::EmptyTest(_) => ErrorKind::EmptyTest,
            Error::ConfigParse(_) | Error::FileRead { .. } | Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Process exit code for a run aborted by this error
    pub fn exit_code(&self) -> i32 {
        ERROR_EXIT_CODE
    }

    /// Create a file read error for the given path
    pub fn file_read(path: &Path, error: io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a config-not-found error
    pub fn config_not_found(name: &str, dir: &Path) -> Self {
        Self::ConfigNotFound {
            name: name.to_string(),
            dir: dir.display().to_string(),
        }
    }
}
