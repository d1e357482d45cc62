use axum::{Json, extract::State};

use crate::{AppState, api::models::auth::IdentityResponse, errors::Result, types::Identity};

/// The caller's identity and the scopes it currently holds.
#[tracing::instrument(skip_all)]
pub async fn get_identity(State(state): State<AppState>, identity: Identity) -> Result<Json<IdentityResponse>> {
    let granted = state.gate.authorizer().get_scopes(&identity).await?;
    Ok(Json(IdentityResponse::new(identity, granted)))
}
