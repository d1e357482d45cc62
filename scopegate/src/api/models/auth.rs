//! API response models for the caller's own identity.

use serde::{Deserialize, Serialize};

use crate::types::{GrantedScopes, Identity, PrincipalType, Scope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub principal_type: PrincipalType,
    pub uid: String,
    pub scopes: Vec<Scope>,
}

impl IdentityResponse {
    pub fn new(identity: Identity, granted: GrantedScopes) -> Self {
        Self {
            principal_type: identity.principal_type,
            uid: identity.uid,
            scopes: granted.global_scopes.into_iter().collect(),
        }
    }
}
