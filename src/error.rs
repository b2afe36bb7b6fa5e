/// Unified error handling for the desvio redirection engine
///
/// This module provides the error type system covering rule compilation,
/// configuration, and backup persistence. Routing outcomes that are normal
/// and expected ("no hosts found") are modelled as absent results, never as
/// errors, so nothing in this module crosses the request path.

use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for desvio operations
#[derive(Debug, Error)]
pub enum DesvioError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rule document compilation errors
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Backup persistence errors
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Rule-document compilation errors
///
/// Compilation fails closed: when a document produces one of these, no model
/// is installed and the previously compiled model stays authoritative.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule document parse error: {0}")]
    Parse(String),

    #[error("Rule document validation error: {0}")]
    Validation(String),
}

/// Backup persistence errors
///
/// Backup failures are logged and reported as `false`/`None` at the store
/// boundary; this type exists for callers that need the failure detail.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup IO error: {0}")]
    Io(String),

    #[error("Backup serialize error: {0}")]
    Serialize(String),
}

impl From<io::Error> for BackupError {
    fn from(e: io::Error) -> Self {
        BackupError::Io(e.to_string())
    }
}

/// Result type alias for desvio operations
pub type DesvioResult<T> = Result<T, DesvioError>;

/// Convenience methods for creating specific error types
impl DesvioError {
    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        DesvioError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (the engine keeps serving)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A failed compile keeps the previous model; a failed backup
            // keeps the previous snapshot. Both degrade freshness only.
            DesvioError::Rule(_) => true,
            DesvioError::Backup(_) => true,
            DesvioError::Config(_) => false,
            DesvioError::Internal { .. } => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DesvioError::Config(_) => ErrorSeverity::Critical,
            DesvioError::Internal { .. } => ErrorSeverity::Critical,
            DesvioError::Rule(_) => ErrorSeverity::Error,
            DesvioError::Backup(_) => ErrorSeverity::Warning,
        }
    }
}

impl RuleError {
    pub fn parse<S: Into<String>>(message: S) -> Self {
        RuleError::Parse(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        RuleError::Validation(message.into())
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
