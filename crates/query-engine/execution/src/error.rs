//! Errors for execution.

use query_engine_metadata::metadata::CustomEntityError;
use query_engine_translation::translation;

/// Errors raised while running plans or building entity models.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not Found")]
    EntityNotFound,
    #[error("Entity not deleted")]
    EntityNotDeleted,
    #[error("Entity not updated")]
    EntityNotUpdated,
    /// A unique or primary key constraint rejected a write. Holds the driver message.
    #[error("{0}")]
    ConstraintViolation(String),
    #[error("{0}")]
    Translation(#[from] translation::error::Error),
    #[error("invalid custom entity: {0}")]
    CustomEntity(#[from] CustomEntityError),
    #[error("{0}")]
    DB(sqlx::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Error {
        match &err {
            sqlx::Error::Database(database_error) if database_error.is_unique_violation() => {
                Error::ConstraintViolation(database_error.message().to_string())
            }
            _ => Error::DB(err),
        }
    }
}
