//! Application-wide error types.
//!
//! Every fallible operation in the crate returns [`AppError`].  Callers that
//! need to map failures onto a response (HTTP status, CLI exit code, …) use
//! [`AppError::kind`], which collapses the variants into the four outcomes a
//! caller must distinguish.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict on {key}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        key: String,
        expected: Option<i64>,
        found: Option<i64>,
    },
}

/// Caller-visible outcome of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required identifier was missing; nothing was read or written.
    InvalidRequest,
    NotFound,
    /// Stale optimistic write; re-fetch and retry.
    VersionConflict,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::InvalidRequest,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::VersionConflict { .. } => ErrorKind::VersionConflict,
            AppError::Config(_) | AppError::Logger(_) | AppError::Io(_) | AppError::Store(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, AppError::VersionConflict { .. })
    }
}

/// Reject an empty (or whitespace-only) identifier before touching the store.
pub fn require_id<'a>(value: &'a str, what: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("missing {what}")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
        assert_eq!(e.kind(), ErrorKind::Internal);
    }

    #[test]
    fn version_conflict_kind() {
        let e = AppError::VersionConflict {
            key: "WIKI#atlas".into(),
            expected: Some(1),
            found: Some(2),
        };
        assert!(e.is_version_conflict());
        assert_eq!(e.kind(), ErrorKind::VersionConflict);
        assert!(e.to_string().contains("WIKI#atlas"));
    }

    #[test]
    fn not_found_and_validation_kinds() {
        assert_eq!(AppError::NotFound("page".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::Validation("missing user_id".into()).kind(),
            ErrorKind::InvalidRequest
        );
    }

    #[test]
    fn require_id_rejects_blank() {
        assert!(require_id("  ", "user_id").is_err());
        assert_eq!(require_id(" u-1 ", "user_id").unwrap(), "u-1");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}
