//! Client error types

use chunkup_core::SessionId;
use std::path::PathBuf;
use thiserror::Error;

/// Remote store operation, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Initiate,
    UploadPart,
    Complete,
    Abort,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreOp::Initiate => "initiate",
            StoreOp::UploadPart => "upload-part",
            StoreOp::Complete => "complete",
            StoreOp::Abort => "abort",
        })
    }
}

/// Failure reported by a remote store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{operation} failed: {message}")]
    Service {
        operation: StoreOp,
        code: Option<String>,
        message: String,
    },

    /// The store rejected a part because its digest did not match
    #[error("part {part_number} failed integrity check: {message}")]
    Integrity { part_number: u32, message: String },
}

impl StoreError {
    pub fn service(operation: StoreOp, message: impl Into<String>) -> Self {
        StoreError::Service {
            operation,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(
        operation: StoreOp,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        StoreError::Service {
            operation,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Every store error is a service error; integrity failures are a subset
    pub fn is_service(&self) -> bool {
        true
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::Integrity { .. })
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            StoreError::Service { code, .. } => code.as_deref(),
            StoreError::Integrity { .. } => None,
        }
    }
}

/// Why a single part failed
#[derive(Error, Debug)]
pub enum PartError {
    #[error("reading part bytes: {0}")]
    Read(#[from] std::io::Error),

    #[error("source ended early: expected {expected} bytes, read {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(#[from] chunkup_core::ChunkupError),

    #[error("Cannot read source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Source {} is empty; nothing to upload", .0.display())]
    EmptySource(PathBuf),

    #[error("Failed to initiate multipart upload: {0}")]
    Initiation(#[source] StoreError),

    #[error("Part {part_number} failed: {cause}")]
    PartUpload {
        part_number: u32,
        #[source]
        cause: PartError,
    },

    #[error("Upload cancelled after {completed_parts} part(s)")]
    Cancelled { completed_parts: usize },

    #[error("Failed to complete multipart upload: {0}")]
    Completion(#[source] StoreError),

    #[error("{original}; abort of session {session} also failed: {abort}")]
    AbortFailed {
        session: SessionId,
        #[source]
        original: Box<UploadError>,
        abort: StoreError,
    },
}

impl UploadError {
    /// The error that caused the upload to fail, ignoring any abort failure
    pub fn primary(&self) -> &UploadError {
        match self {
            UploadError::AbortFailed { original, .. } => original.primary(),
            other => other,
        }
    }

    /// Secondary failure from the cleanup abort, if there was one
    pub fn abort_error(&self) -> Option<&StoreError> {
        match self {
            UploadError::AbortFailed { abort, .. } => Some(abort),
            _ => None,
        }
    }

    /// Store error behind this failure, if it came from the store
    pub fn store_error(&self) -> Option<&StoreError> {
        match self.primary() {
            UploadError::Initiation(e) | UploadError::Completion(e) => Some(e),
            UploadError::PartUpload {
                cause: PartError::Store(e),
                ..
            } => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.primary(), UploadError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_is_a_service_error() {
        let err = StoreError::Integrity {
            part_number: 2,
            message: "digest mismatch".to_string(),
        };
        assert!(err.is_service());
        assert!(err.is_integrity());
        assert_eq!(err.code(), None);

        let err = StoreError::with_code(StoreOp::UploadPart, "SlowDown", "throttled");
        assert!(err.is_service());
        assert!(!err.is_integrity());
        assert_eq!(err.code(), Some("SlowDown"));
    }

    #[test]
    fn test_abort_failure_keeps_original_primary() {
        let original = UploadError::PartUpload {
            part_number: 3,
            cause: PartError::Store(StoreError::service(StoreOp::UploadPart, "connection reset")),
        };
        let err = UploadError::AbortFailed {
            session: SessionId::new("upload-1"),
            original: Box::new(original),
            abort: StoreError::service(StoreOp::Abort, "timed out"),
        };

        assert!(matches!(
            err.primary(),
            UploadError::PartUpload { part_number: 3, .. }
        ));
        assert_eq!(
            err.store_error().unwrap().to_string(),
            "upload-part failed: connection reset"
        );
        assert_eq!(err.abort_error().unwrap().to_string(), "abort failed: timed out");
        assert_eq!(
            err.to_string(),
            "Part 3 failed: upload-part failed: connection reset; abort of session upload-1 also failed: abort failed: timed out"
        );
    }

    #[test]
    fn test_cancelled_through_abort_failure() {
        let err = UploadError::AbortFailed {
            session: SessionId::new("s"),
            original: Box::new(UploadError::Cancelled { completed_parts: 1 }),
            abort: StoreError::service(StoreOp::Abort, "gone"),
        };
        assert!(err.is_cancelled());
    }
}
