//! The module contains the error the engine can throw.
//!
//! The errors map onto the categories callers act upon:
//!
//! - [`Validation`] bad input shape, surfaced, never retried.
//! - [`NotFound`] unknown account/source/item, surfaced, never retried.
//! - [`Conflict`] duplicate natural key, the caller may retry with other input.
//! - [`Database`] transient storage failure, retriable.
//! - [`Credential`] a stored credential cannot be decrypted, requires re-linking.
//! - [`ExternalFeed`] upstream feed failure, retriable.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`Conflict`]: EngineError::Conflict
//!  [`Database`]: EngineError::Database
//!  [`Credential`]: EngineError::Credential
//!  [`ExternalFeed`]: EngineError::ExternalFeed
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    Conflict(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("External feed error: {0}")]
    ExternalFeed(String),
    #[error("Malformed task payload: {0}")]
    MalformedPayload(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Whether a dispatcher should schedule another attempt.
    ///
    /// `false` is the "do not retry" sentinel: retrying cannot change the
    /// outcome without a change of input or a re-link.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Database(_) | Self::ExternalFeed(_) | Self::Cancelled => true,
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::Conflict(_)
            | Self::Credential(_)
            | Self::MalformedPayload(_) => false,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Credential(a), Self::Credential(b)) => a == b,
            (Self::ExternalFeed(a), Self::ExternalFeed(b)) => a == b,
            (Self::MalformedPayload(a), Self::MalformedPayload(b)) => a == b,
            (Self::Cancelled, Self::Cancelled) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_and_feed_errors_are_retriable() {
        assert!(EngineError::Database(DbErr::Custom("locked".to_string())).is_retriable());
        assert!(EngineError::ExternalFeed("503".to_string()).is_retriable());
        assert!(EngineError::Cancelled.is_retriable());
    }

    #[test]
    fn caller_errors_are_permanent() {
        assert!(!EngineError::Validation("x".to_string()).is_retriable());
        assert!(!EngineError::NotFound("x".to_string()).is_retriable());
        assert!(!EngineError::Credential("x".to_string()).is_retriable());
        assert!(!EngineError::MalformedPayload("x".to_string()).is_retriable());
    }
}
