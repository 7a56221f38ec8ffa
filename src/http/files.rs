//! Static file serving under the configured document root.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

use super::error::ApiError;

/// MIME type inferred from the file extension.
pub fn mime_for_path(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "txt" => "text/plain",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpe" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "tiff" | "tif" => "image/tiff",
        "svg" | "svgz" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Router fallback: everything outside `/api/` is a file lookup; unknown
/// API paths are a 400 like any other malformed request.
pub async fn serve_static(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path();

    if path.starts_with("/api/") {
        return ApiError::BadRequest("Invalid request".into()).into_response();
    }

    let relative = if path == "/" || path == "/index.html" {
        "index.html"
    } else {
        path.trim_start_matches('/')
    };

    // Path traversal guard.
    if relative.contains("..") {
        return ApiError::InvalidPath.into_response();
    }

    let full_path = state.config.www_root.join(relative);
    match tokio::fs::read(&full_path).await {
        Ok(content) => {
            let mut response = (StatusCode::OK, content).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(mime_for_path(relative)),
            );
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("max-age=3600"),
            );
            response
        }
        Err(_) => ApiError::FileNotFound.into_response(),
    }
}
