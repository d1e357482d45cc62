//! Common type definitions shared by the authentication and authorization layers.
//!
//! This module defines:
//! - Type aliases for entity IDs (group ids, API key revoke ids)
//! - [`Identity`]: the principal resolved from a credential
//! - [`CredentialScheme`] / [`Credential`]: raw credentials presented on a request
//! - [`GrantedScopes`]: the effective scope set handed to route guards
//!
//! Identities and credentials are request scoped: they are created during a single
//! authentication attempt and dropped with the request. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// Type aliases for IDs
pub type GroupId = String;
pub type RevokeId = String;

/// A single capability string, e.g. `"settings.write"`.
pub type Scope = String;

/// Kind of principal behind an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Application,
}

/// The resolved principal behind a request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub principal_type: PrincipalType,
    pub uid: String,
}

impl Identity {
    pub fn user(uid: impl Into<String>) -> Self {
        Self {
            principal_type: PrincipalType::User,
            uid: uid.into(),
        }
    }

    pub fn application(uid: impl Into<String>) -> Self {
        Self {
            principal_type: PrincipalType::Application,
            uid: uid.into(),
        }
    }
}

/// Schemes a client may use to present a credential.
///
/// Deserialization from configuration is strict: an unknown scheme name fails config
/// loading, which is how an unsupported scheme becomes a startup error rather than a
/// per-request condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScheme {
    ApiKey,
    BearerToken,
    CookieToken,
}

impl CredentialScheme {
    /// Every known scheme, in extraction order.
    pub const ALL: [CredentialScheme; 3] = [CredentialScheme::ApiKey, CredentialScheme::BearerToken, CredentialScheme::CookieToken];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialScheme::ApiKey => "api_key",
            CredentialScheme::BearerToken => "bearer_token",
            CredentialScheme::CookieToken => "cookie_token",
        }
    }
}

impl fmt::Display for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw, unauthenticated value extracted for one scheme. `value` is `None` when the
/// request did not carry this kind of credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub scheme: CredentialScheme,
    pub value: Option<String>,
}

impl Credential {
    pub fn absent(scheme: CredentialScheme) -> Self {
        Self { scheme, value: None }
    }

    pub fn is_present(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }
}

// Credential values must never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Per-identity resolved scope view handed to route guards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedScopes {
    pub global_scopes: BTreeSet<Scope>,
}

impl GrantedScopes {
    pub fn contains(&self, scope: &str) -> bool {
        self.global_scopes.contains(scope)
    }

    /// Required scopes that are not granted, in the order they were required.
    pub fn missing<'a>(&self, required: &'a [Scope]) -> Vec<&'a Scope> {
        required.iter().filter(|scope| !self.contains(scope)).collect()
    }
}

/// Scope names checked by the built-in routes.
pub mod scopes {
    pub const API_KEY_READ: &str = "apiKey.read";
    pub const API_KEY_WRITE: &str = "apiKey.write";
    pub const GROUP_READ: &str = "group.read";
    pub const GROUP_WRITE: &str = "group.write";

    /// Every scope known to the platform; granted to the built-in admins group.
    pub const ALL: &[&str] = &[
        API_KEY_READ,
        API_KEY_WRITE,
        "collection.read",
        "collection.write",
        "document.chunk",
        GROUP_READ,
        GROUP_WRITE,
        "llm.run",
        "settings.read",
        "settings.write",
        "test",
    ];
}
