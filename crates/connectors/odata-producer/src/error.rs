//! Errors reported to OData clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use query_engine_execution::error as execution;
use query_engine_translation::translation::error::{self as translation, ErrorKind};

use crate::format::{self, Format};

pub const NOT_FOUND: &str = "Not Found";
pub const BAD_REQUEST: &str = "Bad Request";
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// An error as the client sees it. Every variant renders as an error document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ODataError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Not Implemented")]
    NotImplemented,
    /// `inner` holds the underlying cause, which is only shown when inline errors are
    /// enabled.
    #[error("{message}")]
    ServerError {
        message: String,
        inner: Option<String>,
    },
}

impl ODataError {
    pub fn bad_request() -> Self {
        ODataError::BadRequest(BAD_REQUEST.to_string())
    }

    pub fn not_found() -> Self {
        ODataError::NotFound(NOT_FOUND.to_string())
    }

    /// A generic server error hiding `cause` behind "Internal Server Error".
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        ODataError::ServerError {
            message: INTERNAL_SERVER_ERROR.to_string(),
            inner: Some(cause.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ODataError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ODataError::NotFound(_) => StatusCode::NOT_FOUND,
            ODataError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ODataError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ODataError::ServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `<code>` of the error document.
    pub fn code(&self) -> &'static str {
        match self {
            ODataError::BadRequest(_) => "BadRequestException",
            ODataError::NotFound(_) => "NotFoundException",
            ODataError::MethodNotAllowed => "MethodNotAllowedException",
            ODataError::NotImplemented => "NotImplementedException",
            ODataError::ServerError { .. } => "ServerErrorException",
        }
    }

    pub fn inner_error(&self) -> Option<&str> {
        match self {
            ODataError::ServerError { inner, .. } => inner.as_deref(),
            _ => None,
        }
    }

    /// Log the error with the fields our log pipeline expects.
    pub fn log(&self, name: &'static str) {
        if self.status().is_server_error() {
            tracing::error!(
                meta.signal_type = "log",
                event.domain = "odata",
                event.name = name,
                name = name,
                body = %self,
                inner = ?self.inner_error(),
                error = true,
            );
        } else {
            tracing::info!(status = %self.status(), body = %self, "{name}");
        }
    }
}

impl From<translation::Error> for ODataError {
    fn from(error: translation::Error) -> Self {
        match error.kind() {
            ErrorKind::BadRequest => ODataError::BadRequest(error.to_string()),
            ErrorKind::NotFound => ODataError::NotFound(error.to_string()),
            ErrorKind::ServerError => ODataError::ServerError {
                message: error.to_string(),
                inner: None,
            },
        }
    }
}

impl From<execution::Error> for ODataError {
    fn from(error: execution::Error) -> Self {
        match error {
            execution::Error::EntityNotFound => ODataError::not_found(),
            execution::Error::EntityNotDeleted | execution::Error::EntityNotUpdated => {
                ODataError::BadRequest(error.to_string())
            }
            execution::Error::Translation(error) => error.into(),
            execution::Error::ConstraintViolation(message) => ODataError::internal(message),
            execution::Error::CustomEntity(error) => ODataError::internal(error),
            execution::Error::DB(error) => ODataError::internal(error),
        }
    }
}

impl From<sqlx::Error> for ODataError {
    fn from(error: sqlx::Error) -> Self {
        execution::Error::from(error).into()
    }
}

impl IntoResponse for ODataError {
    fn into_response(self) -> Response {
        self.log("Request error");
        format::error::render(&self, Format::Atom, None, false).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_errors_keep_their_kind() {
        let error: ODataError = translation::Error::EntitySetNotFound("Nopes".to_string()).into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.code(), "NotFoundException");

        let error: ODataError = translation::Error::InvalidFilterField("Nope".to_string()).into();
        assert_eq!(
            error,
            ODataError::BadRequest("There was an invalid field in the $filter parameter".to_string())
        );

        let error: ODataError = translation::Error::SkipTokenNotSupported.into();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.inner_error(), None);
    }

    #[test]
    fn write_conflicts_hide_the_driver_message() {
        let error: ODataError =
            execution::Error::ConstraintViolation("UNIQUE constraint failed: t.id".to_string()).into();
        assert_eq!(error.to_string(), INTERNAL_SERVER_ERROR);
        assert_eq!(error.inner_error(), Some("UNIQUE constraint failed: t.id"));

        let error: ODataError = execution::Error::EntityNotDeleted.into();
        assert_eq!(error, ODataError::BadRequest("Entity not deleted".to_string()));

        let error: ODataError = execution::Error::EntityNotFound.into();
        assert_eq!(error, ODataError::not_found());
    }
}
