//! API error kinds and their wire representation.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};

/// Every failure the request surface can report. Each variant maps to the
/// documented `{code, message}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid path")]
    InvalidPath,

    #[error("{0}")]
    InvalidToken(&'static str),

    #[error("Player token has not been found")]
    UnknownToken,

    #[error("Map not found")]
    MapNotFound,

    #[error("File not found")]
    FileNotFound,

    #[error("Invalid method")]
    InvalidMethod(&'static str),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) | ApiError::BadRequest(_) | ApiError::InvalidPath => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidToken(_) | ApiError::UnknownToken => StatusCode::UNAUTHORIZED,
            ApiError::MapNotFound | ApiError::FileNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument(_) => "invalidArgument",
            ApiError::BadRequest(_) => "badRequest",
            ApiError::InvalidPath => "invalidPath",
            ApiError::InvalidToken(_) => "invalidToken",
            ApiError::UnknownToken => "unknownToken",
            ApiError::MapNotFound => "mapNotFound",
            ApiError::FileNotFound => "fileNotFound",
            ApiError::InvalidMethod(_) => "invalidMethod",
            ApiError::Internal(_) => "internalError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        let mut response = (self.status(), Json(body)).into_response();
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        );
        if let ApiError::InvalidMethod(allow) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_pairing() {
        let cases = [
            (ApiError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST, "invalidArgument"),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "badRequest"),
            (ApiError::InvalidPath, StatusCode::BAD_REQUEST, "invalidPath"),
            (ApiError::InvalidToken("x"), StatusCode::UNAUTHORIZED, "invalidToken"),
            (ApiError::UnknownToken, StatusCode::UNAUTHORIZED, "unknownToken"),
            (ApiError::MapNotFound, StatusCode::NOT_FOUND, "mapNotFound"),
            (ApiError::FileNotFound, StatusCode::NOT_FOUND, "fileNotFound"),
            (ApiError::InvalidMethod("POST"), StatusCode::METHOD_NOT_ALLOWED, "invalidMethod"),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "internalError"),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status(), status);
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn method_mismatch_carries_allow_header() {
        let response = ApiError::InvalidMethod("GET, HEAD").into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    }
}
