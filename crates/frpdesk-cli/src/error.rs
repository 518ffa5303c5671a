//! CLI-specific error type and exit-code mapping.

use thiserror::Error;

use frpdesk_core::paths::PathError;
use frpdesk_core::ports::StoreError;
use frpdesk_core::services::OrchestratorError;

/// CLI-facing error with a sysexits-style exit code.
#[derive(Debug, Error)]
pub enum CliError {
    /// Domain-level failure (not found, already running, ...).
    #[error("{0}")]
    Core(String),

    /// Invalid arguments or input that failed validation.
    #[error("invalid arguments: {0}")]
    Arguments(String),

    /// Filesystem failure outside the store.
    #[error("io error: {0}")]
    Io(String),

    /// Configuration problem (data directory resolution and friends).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisted store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Process supervision failure.
    #[error("process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map the error to an exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: general error
    /// - 2: invalid arguments (EX_USAGE)
    /// - 64-78: sysexits.h categories
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Process(_) => 71,  // EX_OSERR
            Self::Store(_) => 73,    // EX_CANTCREAT
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<OrchestratorError> for CliError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(e) => Self::Arguments(e.to_string()),
            OrchestratorError::Store(e) => Self::Store(e.to_string()),
            OrchestratorError::Supervisor(e) => Self::Process(e.to_string()),
            e @ OrchestratorError::ConfigWrite { .. } => Self::Io(e.to_string()),
            other => Self::Core(other.to_string()),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
