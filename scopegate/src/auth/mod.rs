//! Authentication and authorization core.
//!
//! A request passes through three stages:
//!
//! 1. **Extraction** ([`credentials`]): at most one credential is taken from the request
//!    (API key header, `Authorization: Bearer`, or the token cookie). Two or more is a 400.
//! 2. **Authentication** ([`authentication`]): the credential is resolved to an
//!    [`Identity`](crate::types::Identity). API keys resolve to application principals keyed by
//!    their revoke id; tokens resolve to user principals keyed by their subject. Anything not
//!    accepted is a 401 carrying `WWW-Authenticate` challenges for every supported scheme.
//! 3. **Authorization** ([`authorization`]): the identity's scopes are the union of the scopes
//!    of every group whose member list covers it ([`pattern`], [`permissions`]). Missing
//!    required scopes is a 403.
//!
//! [`gate`] strings the stages together and exposes them to axum as route middleware.
//!
//! # Usage in Routers
//!
//! ```ignore
//! use scopegate::auth::gate::{ScopeGuard, require_scopes};
//! use axum::middleware::from_fn_with_state;
//!
//! let guard = ScopeGuard::new(gate.clone(), &["group.read"]);
//! router.route("/api/groups", get(list_groups).route_layer(from_fn_with_state(guard, require_scopes)));
//!
//! async fn list_groups(identity: Identity) -> Result<Json<Vec<GroupResponse>>> { ... }
//! ```
//!
//! # Disabled Authentication
//!
//! With `auth.disabled`, every request is served as a fresh guest user and every scope check
//! passes. This exists for local development only.

pub mod authentication;
pub mod authorization;
pub mod credentials;
pub mod gate;
pub mod pattern;
pub mod permissions;
pub mod session;

use std::sync::Arc;

use crate::{
    config::AuthConfig,
    directory::{ApiKeyStore, GroupDirectory},
    errors::Result,
    settings::SecretResolver,
};
use authentication::AuthenticatorFactory;
use authorization::authorizer_for;
use credentials::CredentialExtractor;
use gate::AuthGate;
use session::TokenCodec;

/// Wire the gate for the configured authentication mode.
pub fn build_gate(
    config: &AuthConfig,
    groups: Arc<dyn GroupDirectory>,
    api_keys: Arc<dyn ApiKeyStore>,
    settings: Arc<dyn SecretResolver>,
    codec: Arc<dyn TokenCodec>,
) -> Result<AuthGate> {
    let extractor = CredentialExtractor::new(config)?;
    let authentication = AuthenticatorFactory::new(config, api_keys.clone(), settings, codec)?;
    let authorizer = authorizer_for(config.disabled, groups, api_keys);
    Ok(AuthGate::new(extractor, authentication, authorizer))
}
