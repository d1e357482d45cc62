use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::ensure_grantable,
        models::{
            api_keys::{ApiKeyCreate, ApiKeyCreatedResponse, ApiKeyResponse},
            groups::validate_scopes,
        },
    },
    errors::Result,
    types::{Identity, RevokeId},
};

#[tracing::instrument(skip_all)]
pub async fn list_api_keys(State(state): State<AppState>) -> Result<Json<Vec<ApiKeyResponse>>> {
    let keys = state.api_keys.list().await?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

#[tracing::instrument(skip_all)]
pub async fn create_api_key(
    State(state): State<AppState>,
    identity: Identity,
    Json(create): Json<ApiKeyCreate>,
) -> Result<(StatusCode, Json<ApiKeyCreatedResponse>)> {
    validate_scopes(&create.scopes)?;
    ensure_grantable(&state, &identity, &create.scopes).await?;

    let created = state.api_keys.create(create.scopes).await?;
    info!("API key {} created by {}", created.revoke_id, identity.uid);
    Ok((StatusCode::CREATED, Json(ApiKeyCreatedResponse::from(created))))
}

#[tracing::instrument(skip_all, fields(revoke_id = %revoke_id))]
pub async fn revoke_api_key(State(state): State<AppState>, identity: Identity, Path(revoke_id): Path<RevokeId>) -> Result<StatusCode> {
    state.api_keys.revoke(&revoke_id).await?;
    info!("API key {} revoked by {}", revoke_id, identity.uid);
    Ok(StatusCode::NO_CONTENT)
}
