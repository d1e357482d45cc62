//! HTTP request handlers.
//!
//! Handlers receive an already authorized [`Identity`](crate::types::Identity): each route is
//! wrapped in [`require_scopes`](crate::auth::gate::require_scopes) with the scopes it needs,
//! so handlers only validate input and call the directory. Handlers that hand out scopes (on
//! new API keys or groups) only accept scopes the caller holds itself.
//!
//! - [`auth`]: the caller's identity and granted scopes
//! - [`api_keys`]: API key creation, listing and revocation
//! - [`groups`]: owner-scoped group management

pub mod api_keys;
pub mod auth;
pub mod groups;

use crate::{
    AppState,
    errors::{Error, Result},
    types::{Identity, Scope},
};

/// Reject grants of scopes the caller does not hold.
pub(crate) async fn ensure_grantable(state: &AppState, identity: &Identity, requested: &[Scope]) -> Result<()> {
    let missing = state.gate.authorizer().missing_scopes(identity, requested).await?;
    if missing.is_empty() {
        Ok(())
    } else {
        tracing::debug!("{} tried to grant scopes it lacks: {:?}", identity.uid, missing);
        Err(Error::MissingScopes { missing })
    }
}
