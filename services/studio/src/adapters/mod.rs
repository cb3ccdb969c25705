pub mod course_api;
pub mod local_cache;
pub mod media_host;
pub mod video_metadata;

pub use course_api::HttpCourseApi;
pub use local_cache::SqliteCache;
pub use media_host::HttpMediaHost;
pub use video_metadata::OEmbedVideoMetadata;

use curriculum_core::ports::PortError;
use reqwest::{Response, StatusCode};

/// Turns a non-success HTTP response into a `PortError`, keeping the body as detail.
pub(crate) async fn error_from_response(response: Response) -> PortError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let detail = format!("{}: {}", status, body.trim());
    match status {
        StatusCode::NOT_FOUND => PortError::NotFound(detail),
        s if s.is_client_error() => PortError::Rejected(detail),
        _ => PortError::Unexpected(detail),
    }
}

/// Maps a transport failure (connection, timeout, decoding) into a `PortError`.
pub(crate) fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}
