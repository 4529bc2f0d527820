use thiserror::Error;
use tokio_rusqlite::rusqlite::{self, ffi};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("no matching row")]
    NotFound,

    #[error("row already exists")]
    UniqueViolation,

    #[error("referenced row does not exist")]
    ForeignKeyViolation,
}

/// Coarse classification of a store failure, independent of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    NotFound,
    Other,
}

impl DbError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            DbError::NotFound => StoreErrorKind::NotFound,
            DbError::UniqueViolation => StoreErrorKind::UniqueViolation,
            DbError::ForeignKeyViolation => StoreErrorKind::ForeignKeyViolation,
            DbError::Sqlite(_) | DbError::Connection(_) => StoreErrorKind::Other,
        }
    }

    /// Map a constraint failure reported by SQLite onto its classified variant.
    /// Returns `None` for anything that isn't a unique or foreign-key violation.
    pub(crate) fn from_constraint(err: &rusqlite::Error) -> Option<Self> {
        let rusqlite::Error::SqliteFailure(failure, _) = err else {
            return None;
        };
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Some(DbError::UniqueViolation)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(DbError::ForeignKeyViolation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
