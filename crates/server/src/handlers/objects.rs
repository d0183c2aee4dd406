//! Config and blob handlers.

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::protocol::{BlobListResponse, download_response, head_response, require_v2_accept};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::RANGE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use restgate_core::{BlobKey, BlobType, RepositoryName};

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(RANGE).and_then(|v| v.to_str().ok())
}

/// HEAD /{repo}/config
pub async fn check_config(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path(repo): Path<String>,
) -> ApiResult<Response> {
    let repository: RepositoryName = repo.parse()?;
    let size = state.gateway.check_config(&repository).await?;
    Ok(head_response(size))
}

/// GET /{repo}/config
pub async fn get_config(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path(repo): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let repository: RepositoryName = repo.parse()?;
    let download = state
        .gateway
        .get_config(&repository, range_header(&headers))
        .await?;
    Ok(download_response(download))
}

/// POST /{repo}/config
pub async fn save_config(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(repo): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let repository: RepositoryName = repo.parse()?;
    state
        .gateway
        .save_config(&repository, body, claims.write_once)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /{repo}/{type} - v2 listing.
pub async fn list_blobs(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path((repo, blob_type)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<BlobListResponse> {
    require_v2_accept(&headers)?;
    let repository: RepositoryName = repo.parse()?;
    let blob_type: BlobType = blob_type.parse()?;

    let blobs = state.gateway.list_blobs(&repository, blob_type).await?;
    Ok(BlobListResponse(blobs))
}

/// HEAD /{repo}/{type}/{name}
pub async fn check_blob(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path((repo, blob_type, name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let key = BlobKey::parse(&repo, &blob_type, &name)?;
    let size = state.gateway.check_blob(&key).await?;
    Ok(head_response(size))
}

/// GET /{repo}/{type}/{name} - honours `Range`.
pub async fn get_blob(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path((repo, blob_type, name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let key = BlobKey::parse(&repo, &blob_type, &name)?;
    let download = state
        .gateway
        .get_blob(&key, range_header(&headers))
        .await?;
    Ok(download_response(download))
}

/// POST /{repo}/{type}/{name}
pub async fn save_blob(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path((repo, blob_type, name)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let key = BlobKey::parse(&repo, &blob_type, &name)?;
    state
        .gateway
        .save_blob(&key, body, claims.write_once)
        .await?;
    Ok(StatusCode::OK)
}

/// DELETE /{repo}/{type}/{name}
pub async fn delete_blob(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path((repo, blob_type, name)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let key = BlobKey::parse(&repo, &blob_type, &name)?;
    state.gateway.delete_blob(&key, claims.write_once).await?;
    Ok(StatusCode::OK)
}
