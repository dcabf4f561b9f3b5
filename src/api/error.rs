//! Conversion of library failures into JSON error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::LibraryError;

/// Error returned by HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    Library(LibraryError),
    /// Failure outside the library layer (e.g. a crashed worker task)
    Internal(String),
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        ApiError::Library(e)
    }
}

/// Unusable request bodies (wrong content type, bad JSON, wrong field
/// types) are invalid requests like any other
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Library(LibraryError::InvalidRequest(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Library(e) => match e {
                LibraryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
                LibraryError::Resolution(_) => StatusCode::BAD_GATEWAY,
                LibraryError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
                LibraryError::Storage(_)
                | LibraryError::Io(_)
                | LibraryError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Library(e) => e.to_string(),
            ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            error!("{}", message);
        }

        let mut response = (status, Json(json!({ "error": message }))).into_response();

        if let ApiError::Library(LibraryError::RangeNotSatisfiable { length }) = self {
            if let Ok(value) = format!("bytes */{}", length).parse() {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LibraryError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (LibraryError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LibraryError::Resolution("x".into()), StatusCode::BAD_GATEWAY),
            (LibraryError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                LibraryError::RangeNotSatisfiable { length: 3 },
                StatusCode::RANGE_NOT_SATISFIABLE,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unsatisfiable_range_sets_content_range() {
        let response =
            ApiError::from(LibraryError::RangeNotSatisfiable { length: 42 }).into_response();
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */42");
    }
}
