//! API request/response models for API keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    directory::{NewlyCreatedApiKey, RedactedApiKey},
    types::{RevokeId, Scope},
};

/// Request body for creating an API key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyCreate {
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

/// API key as listed: the key itself is never returned again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub revoke_id: RevokeId,
    pub key_hint: String,
    pub scopes: Vec<Scope>,
    pub created_at: DateTime<Utc>,
}

impl From<RedactedApiKey> for ApiKeyResponse {
    fn from(key: RedactedApiKey) -> Self {
        Self {
            revoke_id: key.revoke_id,
            key_hint: key.key_hint,
            scopes: key.scopes,
            created_at: key.created_at,
        }
    }
}

/// Returned once, on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCreatedResponse {
    pub revoke_id: RevokeId,
    pub api_key: String,
}

impl From<NewlyCreatedApiKey> for ApiKeyCreatedResponse {
    fn from(key: NewlyCreatedApiKey) -> Self {
        Self {
            revoke_id: key.revoke_id,
            api_key: key.api_key,
        }
    }
}
