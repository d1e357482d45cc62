//! API key store. Raw keys are returned once at creation and only their keyed digest is kept.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    crypto,
    errors::Result,
    types::{RevokeId, Scope},
};

#[derive(Debug, Clone)]
struct StoredApiKey {
    revoke_id: RevokeId,
    key_hash: String,
    key_hint: String,
    scopes: Vec<Scope>,
    created_at: DateTime<Utc>,
}

/// An API key as visible after creation: no key material, only a hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedApiKey {
    pub revoke_id: RevokeId,
    pub key_hint: String,
    pub scopes: Vec<Scope>,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredApiKey> for RedactedApiKey {
    fn from(key: &StoredApiKey) -> Self {
        Self {
            revoke_id: key.revoke_id.clone(),
            key_hint: key.key_hint.clone(),
            scopes: key.scopes.clone(),
            created_at: key.created_at,
        }
    }
}

/// Returned exactly once, when the key is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewlyCreatedApiKey {
    pub revoke_id: RevokeId,
    pub api_key: String,
}

/// Lookups used by authentication and authorization.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_by_raw_key(&self, key: &str) -> Result<Option<RedactedApiKey>>;

    async fn find_by_revoke_id(&self, revoke_id: &str) -> Result<Option<RedactedApiKey>>;
}

#[async_trait]
pub trait ApiKeyManagement: Send + Sync {
    async fn create(&self, scopes: Vec<Scope>) -> Result<NewlyCreatedApiKey>;

    /// Permanently delete a key. Unknown ids are ignored.
    async fn revoke(&self, revoke_id: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<RedactedApiKey>>;
}

/// Process-local key storage, indexed by revoke id and by digest.
pub struct InMemoryApiKeys {
    hash_secret: Vec<u8>,
    keys: DashMap<RevokeId, StoredApiKey>,
    by_hash: DashMap<String, RevokeId>,
}

impl InMemoryApiKeys {
    pub fn new(hash_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_secret: hash_secret.into(),
            keys: DashMap::new(),
            by_hash: DashMap::new(),
        }
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeys {
    #[instrument(skip_all)]
    async fn find_by_raw_key(&self, key: &str) -> Result<Option<RedactedApiKey>> {
        let key_hash = crypto::hash_api_key(key, &self.hash_secret)?;
        let Some(revoke_id) = self.by_hash.get(&key_hash).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.keys.get(&revoke_id).map(|stored| RedactedApiKey::from(stored.value())))
    }

    async fn find_by_revoke_id(&self, revoke_id: &str) -> Result<Option<RedactedApiKey>> {
        Ok(self.keys.get(revoke_id).map(|stored| RedactedApiKey::from(stored.value())))
    }
}

#[async_trait]
impl ApiKeyManagement for InMemoryApiKeys {
    async fn create(&self, scopes: Vec<Scope>) -> Result<NewlyCreatedApiKey> {
        let api_key = crypto::generate_api_key();
        let stored = StoredApiKey {
            revoke_id: Uuid::new_v4().simple().to_string(),
            key_hash: crypto::hash_api_key(&api_key, &self.hash_secret)?,
            key_hint: crypto::key_hint(&api_key),
            scopes,
            created_at: Utc::now(),
        };
        let revoke_id = stored.revoke_id.clone();

        self.by_hash.insert(stored.key_hash.clone(), revoke_id.clone());
        self.keys.insert(revoke_id.clone(), stored);
        debug!("Created API key {}", revoke_id);

        Ok(NewlyCreatedApiKey { revoke_id, api_key })
    }

    async fn revoke(&self, revoke_id: &str) -> Result<()> {
        if let Some((_, stored)) = self.keys.remove(revoke_id) {
            self.by_hash.remove(&stored.key_hash);
            debug!("Revoked API key {}", revoke_id);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RedactedApiKey>> {
        let mut keys: Vec<RedactedApiKey> = self.keys.iter().map(|entry| RedactedApiKey::from(entry.value())).collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.revoke_id.cmp(&b.revoke_id)));
        Ok(keys)
    }
}
