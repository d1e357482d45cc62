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
        models::groups::{GroupCreate, GroupMembersUpdate, GroupResponse, GroupScopesUpdate, validate_members, validate_scopes},
    },
    directory::NewGroup,
    errors::{Error, Result},
    types::{GroupId, Identity},
};

fn group_not_found(id: &str) -> Error {
    Error::NotFound {
        resource: "Group".to_string(),
        id: id.to_string(),
    }
}

/// Groups owned by the caller.
#[tracing::instrument(skip_all)]
pub async fn list_groups(State(state): State<AppState>, identity: Identity) -> Result<Json<Vec<GroupResponse>>> {
    let groups = state.groups.get_owned_groups(&identity.uid).await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

#[tracing::instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    identity: Identity,
    Json(create): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    let new_group = NewGroup::try_from(create)?;
    ensure_grantable(&state, &identity, &new_group.scopes).await?;
    let id = state.groups.create_group(&identity.uid, new_group, None).await?;
    info!("Group {} created by {}", id, identity.uid);

    let group = state
        .groups
        .get_group_by_id(&identity.uid, &id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: format!("read back created group {id}"),
        })?;
    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

#[tracing::instrument(skip_all, fields(group_id = %id))]
pub async fn get_group(State(state): State<AppState>, identity: Identity, Path(id): Path<GroupId>) -> Result<Json<GroupResponse>> {
    let group = state
        .groups
        .get_group_by_id(&identity.uid, &id)
        .await?
        .ok_or_else(|| group_not_found(&id))?;
    Ok(Json(GroupResponse::from(group)))
}

#[tracing::instrument(skip_all, fields(group_id = %id))]
pub async fn set_group_members(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<GroupId>,
    Json(update): Json<GroupMembersUpdate>,
) -> Result<Json<GroupResponse>> {
    validate_members(&update.members)?;
    if !state.groups.set_group_members(&identity.uid, &id, update.members).await? {
        return Err(group_not_found(&id));
    }
    get_group(State(state), identity, Path(id)).await
}

#[tracing::instrument(skip_all, fields(group_id = %id))]
pub async fn set_group_scopes(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<GroupId>,
    Json(update): Json<GroupScopesUpdate>,
) -> Result<Json<GroupResponse>> {
    validate_scopes(&update.scopes)?;
    ensure_grantable(&state, &identity, &update.scopes).await?;
    if !state.groups.set_group_scopes(&identity.uid, &id, update.scopes).await? {
        return Err(group_not_found(&id));
    }
    get_group(State(state), identity, Path(id)).await
}

#[tracing::instrument(skip_all, fields(group_id = %id))]
pub async fn delete_group(State(state): State<AppState>, identity: Identity, Path(id): Path<GroupId>) -> Result<StatusCode> {
    if !state.groups.delete_group(&identity.uid, &id).await? {
        return Err(group_not_found(&id));
    }
    info!("Group {} deleted by {}", id, identity.uid);
    Ok(StatusCode::NO_CONTENT)
}
