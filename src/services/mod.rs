//! Services backing every client-facing operation.
//!
//! Each service takes the caller's [`Principal`](crate::access::Principal)
//! explicitly and consults the access policies before touching data.

pub mod identity_service;
pub mod photo_service;
pub mod profile_service;
mod provisioning;
pub mod storage_service;

use crate::access::AccessDenied;
use thiserror::Error;

/// Errors from the profile and photo metadata tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Denied(#[from] AccessDenied),
    /// Also returned for rows that exist but belong to someone else.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DataResult<T> = Result<T, DataError>;

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Lowercase and trim an email address, rejecting obviously malformed ones.
pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(' ') {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Alice@Example.COM "),
            Some("alice@example.com".to_string())
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("a@b@c"), None);
    }
}
