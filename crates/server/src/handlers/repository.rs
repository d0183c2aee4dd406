//! Repository lifecycle handlers.

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use restgate_core::RepositoryName;
use serde::Deserialize;

/// Query string of `POST /{repo}`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    /// Must parse as `true`; anything else is rejected.
    pub create: Option<String>,
}

impl CreateParams {
    pub fn is_create(&self) -> bool {
        self.create
            .as_deref()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false)
    }
}

/// POST /{repo}?create=true - Create a repository.
pub async fn create_repository(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(repo): Path<String>,
    Query(params): Query<CreateParams>,
) -> ApiResult<StatusCode> {
    let repository: RepositoryName = repo.parse()?;
    tracing::debug!(user = %claims.user, repository = %repository, "create repository");

    state
        .gateway
        .create_repository(&repository, params.is_create())
        .await?;
    Ok(StatusCode::OK)
}

/// DELETE /{repo} - Not supported.
pub async fn delete_repository(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path(repo): Path<String>,
) -> ApiResult<StatusCode> {
    state.gateway.delete_repository(&repo).await?;
    Ok(StatusCode::OK)
}
