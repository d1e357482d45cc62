//! Collaborator stores consumed by the auth core.
//!
//! The auth layers only depend on the narrow read traits ([`groups::GroupDirectory`],
//! [`api_keys::ApiKeyStore`]); management traits back the HTTP surface. Both ship with
//! process-local implementations built on `DashMap`.

pub mod api_keys;
pub mod groups;

pub use api_keys::{ApiKeyManagement, ApiKeyStore, InMemoryApiKeys, NewlyCreatedApiKey, RedactedApiKey};
pub use groups::{Group, GroupDirectory, GroupManagement, InMemoryGroups, NewGroup};
