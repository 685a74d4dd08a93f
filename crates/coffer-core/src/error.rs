//! Error types module
//!
//! Every backend and the catalog map their native failures onto one canonical
//! taxonomy, [`ErrorKind`]. Crate-specific error enums implement
//! [`ErrorMetadata`] so callers can branch on the kind without knowing which
//! component produced the failure. [`CofferError`] is the caller-facing error
//! returned by the transfer entrypoints.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like a missing key
    Debug,
    /// Warning level - for recoverable issues like conflicts or bad passwords
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Canonical error taxonomy shared by all storage backends and the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Key or catalog entry absent.
    NotFound,
    /// Uniqueness violation on write.
    Conflict,
    /// Password mismatch on download.
    Unauthorized,
    /// Malformed owner, logical path or range supplied by the caller.
    InvalidInput,
    /// Bad backend configuration; fatal at startup.
    Config,
    /// Network or backend unavailability; the whole operation may be retried.
    Transient,
    /// Entropy, encoding or contract-misuse failure; abort without retry.
    Fatal,
}

impl ErrorKind {
    /// Machine-readable error code (e.g., "NOT_FOUND")
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Transient => "TRANSIENT_ERROR",
            ErrorKind::Fatal => "FATAL",
        }
    }

    /// Whether the caller can recover, either by retrying or by changing the request.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::Unauthorized
                | ErrorKind::Transient
        )
    }

    /// Whether retrying the identical request may succeed.
    pub fn is_retryable(self) -> bool {
        self == ErrorKind::Transient
    }

    pub fn log_level(self) -> LogLevel {
        match self {
            ErrorKind::NotFound | ErrorKind::InvalidInput => LogLevel::Debug,
            ErrorKind::Conflict | ErrorKind::Unauthorized | ErrorKind::Transient => LogLevel::Warn,
            ErrorKind::Config | ErrorKind::Fatal => LogLevel::Error,
        }
    }
}

/// Metadata for errors - lets each error self-describe its canonical kind
pub trait ErrorMetadata {
    /// Canonical kind of this error
    fn kind(&self) -> ErrorKind;

    /// Machine-readable error code
    fn error_code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether this error is recoverable
    fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    /// Log level for this error
    fn log_level(&self) -> LogLevel {
        self.kind().log_level()
    }
}

/// Caller-facing error returned by the transfer entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CofferError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Result type for caller-facing operations
pub type CofferResult<T> = Result<T, CofferError>;

impl CofferError {
    /// Build an error of the given kind carrying `message`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NotFound => CofferError::NotFound(message),
            ErrorKind::Conflict => CofferError::Conflict(message),
            ErrorKind::Unauthorized => CofferError::Unauthorized(message),
            ErrorKind::InvalidInput => CofferError::InvalidInput(message),
            ErrorKind::Config => CofferError::Config(message),
            ErrorKind::Transient => CofferError::Transient(message),
            ErrorKind::Fatal => CofferError::Fatal(message),
        }
    }
}

impl ErrorMetadata for CofferError {
    fn kind(&self) -> ErrorKind {
        match self {
            CofferError::NotFound(_) => ErrorKind::NotFound,
            CofferError::Conflict(_) => ErrorKind::Conflict,
            CofferError::Unauthorized(_) => ErrorKind::Unauthorized,
            CofferError::InvalidInput(_) => ErrorKind::InvalidInput,
            CofferError::Config(_) => ErrorKind::Config,
            CofferError::Transient(_) => ErrorKind::Transient,
            CofferError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_preserves_kind() {
        let kinds = [
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Unauthorized,
            ErrorKind::InvalidInput,
            ErrorKind::Config,
            ErrorKind::Transient,
            ErrorKind::Fatal,
        ];
        for kind in kinds {
            assert_eq!(CofferError::new(kind, "x").kind(), kind);
        }
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = CofferError::NotFound("K7x9".to_string());
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.to_string(), "Not found: K7x9");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
        assert!(!ErrorKind::Fatal.is_recoverable());
        assert!(!ErrorKind::Config.is_recoverable());
        assert_eq!(ErrorKind::Fatal.log_level(), LogLevel::Error);
    }
}
