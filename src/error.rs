//! Central error type.
//!
//! Each subsystem defines its own focused error enum (`LoadError`,
//! `IntegrityError`, `StoreError`); this module aggregates them so callers
//! at the API surface handle a single type.

use thiserror::Error;

use crate::plugin::IntegrityError;
use crate::registry::LoadError;
use crate::store::StoreError;
use crate::types::{CheckId, LinkId};

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Unit missing from disk or the factory map, or contract not satisfied.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Stored digest no longer matches the file on disk.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Persistence gateway failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// IO errors outside the gateway (config reads, directory listings).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Submission rejected: the check definition has been retired.
    #[error("check {check_id} is retired and cannot receive new jobs")]
    RetiredCheck { check_id: CheckId },

    /// Submission rejected: the visibility link is closed.
    #[error("visibility link {link_id} is closed")]
    LinkClosed { link_id: LinkId },

    /// Submission rejected: the link grants a different check.
    #[error("visibility link {link_id} does not grant check {check_id}")]
    LinkMismatch { link_id: LinkId, check_id: CheckId },
}

/// Result type alias for checkrun operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_display() {
        let err = Error::RetiredCheck { check_id: 9 };
        assert_eq!(
            err.to_string(),
            "check 9 is retired and cannot receive new jobs"
        );

        let err = Error::LinkMismatch {
            link_id: 4,
            check_id: 9,
        };
        assert!(err.to_string().contains("link 4"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
