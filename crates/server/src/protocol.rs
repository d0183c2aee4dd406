//! restic REST protocol responses.
//!
//! Only version 2 of the listing format is served: a bare JSON array of
//! `{"name", "size"}` objects under the restic v2 media type.

use crate::error::{ApiError, ApiResult};
use crate::gateway::{BlobEntry, Download};
use axum::body::Body;
use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Media type of the v2 listing format, required in `Accept` and echoed in
/// `Content-Type`.
pub const RESTIC_V2_MEDIA_TYPE: &str = "application/vnd.x.restic.rest.v2";

const OCTET_STREAM: &str = "application/octet-stream";

/// Require the exact v2 media type in `Accept`.
pub fn require_v2_accept(headers: &HeaderMap) -> ApiResult<()> {
    match headers.get(ACCEPT).and_then(|v| v.to_str().ok()) {
        Some(accept) if accept == RESTIC_V2_MEDIA_TYPE => Ok(()),
        _ => Err(ApiError::NotImplemented(format!(
            "listing requires Accept: {RESTIC_V2_MEDIA_TYPE}"
        ))),
    }
}

/// A v2 blob listing.
#[derive(Debug)]
pub struct BlobListResponse(pub Vec<BlobEntry>);

impl IntoResponse for BlobListResponse {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => (
                StatusCode::OK,
                [(CONTENT_TYPE, RESTIC_V2_MEDIA_TYPE)],
                body,
            )
                .into_response(),
            Err(e) => ApiError::Internal(format!("failed to encode listing: {e}")).into_response(),
        }
    }
}

/// Response to a HEAD request: status and `Content-Length`, no body.
pub fn head_response(size: u64) -> Response {
    (StatusCode::OK, [(CONTENT_LENGTH, HeaderValue::from(size))]).into_response()
}

/// Stream a download to the client: `206` with `Content-Range` when partial,
/// `200` otherwise.
pub fn download_response(download: Download) -> Response {
    let Download { object, partial } = download;

    let mut response = Body::from_stream(object.body).into_response();
    *response.status_mut() = if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
    if let Some(len) = object.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    if partial
        && let Some(range) = object.content_range
        && let Ok(value) = HeaderValue::from_str(&range)
    {
        headers.insert(CONTENT_RANGE, value);
    }
    response
}
