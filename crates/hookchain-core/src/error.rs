//! Shared error type across hookchain crates.

use thiserror::Error;

/// Caller-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Bad flag combination, duplicate attach, malformed request.
    InvalidArgument,
    /// Hierarchy or discipline rule refused the mutation.
    PermissionDenied,
    /// Per-hook attachment capacity reached.
    TooManyAttachments,
    /// Detach target or program object absent.
    NotFound,
    /// Recompilation ran out of room; nothing was changed.
    ResourceExhausted,
    /// Configuration could not be loaded or validated.
    Config,
}

impl ErrorCode {
    /// String representation used in logs and JSON diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::TooManyAttachments => "TOO_MANY_ATTACHMENTS",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::Config => "CONFIG",
        }
    }

    /// Negative errno equivalent, for callers that speak the syscall convention.
    pub fn errno(self) -> i32 {
        match self {
            ErrorCode::InvalidArgument | ErrorCode::Config => -22,
            ErrorCode::PermissionDenied => -1,
            ErrorCode::TooManyAttachments => -7,
            ErrorCode::NotFound => -2,
            ErrorCode::ResourceExhausted => -12,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HookchainError>;

/// Unified error type used by core and engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookchainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("too many attachments (limit {limit})")]
    TooManyAttachments { limit: usize },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("config: {0}")]
    Config(String),
}

impl HookchainError {
    /// Map to a stable caller-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            HookchainError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            HookchainError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            HookchainError::TooManyAttachments { .. } => ErrorCode::TooManyAttachments,
            HookchainError::NotFound(_) => ErrorCode::NotFound,
            HookchainError::ResourceExhausted(_) => ErrorCode::ResourceExhausted,
            HookchainError::Config(_) => ErrorCode::Config,
        }
    }
}
