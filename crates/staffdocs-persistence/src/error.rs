//! Diesel and pool failures, and their mapping onto the store contract.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use staffdocs::documents::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => {
                // Constraint names are stable across messages and locales.
                let detail = info
                    .constraint_name()
                    .unwrap_or_else(|| info.message())
                    .to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(detail),
                    DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(detail),
                    DatabaseErrorKind::CheckViolation => Self::CheckViolation(detail),
                    DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                    DatabaseErrorKind::ClosedConnection => Self::TransientIo(detail),
                    other => Self::Unknown(format!("db error kind {other:?}: {}", info.message())),
                }
            }
            DieselError::BrokenTransactionManager => {
                Self::TransientIo("broken transaction manager".into())
            }
            DieselError::RollbackErrorOnCommit {
                rollback_error,
                commit_error,
            } => Self::Unknown(format!("rollback={rollback_error}; commit={commit_error}")),
            other => Self::Unknown(format!("unhandled diesel error: {other}")),
        }
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::UniqueViolation(detail) => StoreError::UniqueViolation(detail),
            PersistenceError::ForeignKeyViolation(detail) => {
                StoreError::ForeignKeyViolation(detail)
            }
            PersistenceError::NotFound => StoreError::NotFound,
            PersistenceError::TransientIo(detail) => StoreError::Unavailable(detail),
            other @ (PersistenceError::CheckViolation(_)
            | PersistenceError::SerializationConflict
            | PersistenceError::Migration(_)
            | PersistenceError::Unknown(_)) => StoreError::Aborted(other.to_string()),
        }
    }
}
