use async_graphql::ErrorExtensions;
use rusqlite::ffi;
use rusqlite::ErrorCode;

use crate::db::models::{UnknownMediaType, UserId};

/// Everything a read or write against the social schema can fail with.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with {key} already exists")]
    Unique { entity: &'static str, key: String },

    #[error("{entity}.{field} is required")]
    Required {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity}.{field} must be at most {max} characters (got {actual})")]
    TooLong {
        entity: &'static str,
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("Invalid media type: {0}")]
    InvalidMediaType(#[from] UnknownMediaType),

    #[error("{entity} references missing {target} {id}")]
    ForeignKey {
        entity: &'static str,
        target: &'static str,
        id: i64,
    },

    #[error("{entity} {id} still has {dependents}")]
    Restricted {
        entity: &'static str,
        id: i64,
        dependents: &'static str,
    },

    #[error("User {0} cannot follow themselves")]
    SelfFollow(UserId),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Classify a failed write against `entity`. Uniqueness failures are
    /// reported with `key` describing the conflicting value; other constraint
    /// failures raised by the schema itself keep SQLite's message.
    pub(crate) fn classify(
        err: rusqlite::Error,
        entity: &'static str,
        key: impl FnOnce() -> String,
    ) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        StoreError::Unique { entity, key: key() }
                    }
                    _ => StoreError::Constraint(msg.unwrap_or_else(|| e.to_string())),
                }
            }
            other => StoreError::Sql(other),
        }
    }

    /// Stable machine-readable code, surfaced as a GraphQL error extension.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unique { .. } => "UNIQUE_VIOLATION",
            StoreError::Required { .. } => "REQUIRED_FIELD",
            StoreError::TooLong { .. } => "TOO_LONG",
            StoreError::InvalidMediaType(_) => "INVALID_MEDIA_TYPE",
            StoreError::ForeignKey { .. } => "FOREIGN_KEY_VIOLATION",
            StoreError::Restricted { .. } => "RESTRICTED",
            StoreError::SelfFollow(_) => "SELF_FOLLOW",
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Constraint(_) => "CONSTRAINT_VIOLATION",
            StoreError::Sql(_) | StoreError::Pool(_) => "INTERNAL",
        }
    }

    /// True for integrity violations the caller can act on, false for
    /// infrastructure failures.
    pub fn is_integrity_violation(&self) -> bool {
        !matches!(self, StoreError::Sql(_) | StoreError::Pool(_))
    }
}

impl ErrorExtensions for StoreError {
    fn extend(&self) -> async_graphql::Error {
        let message = if self.is_integrity_violation() {
            self.to_string()
        } else {
            tracing::error!("Store error: {}", self);
            "Internal server error".to_string()
        };
        let code = self.code();
        async_graphql::Error::new(message).extend_with(|_, e| e.set("code", code))
    }
}
