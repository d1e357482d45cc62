//! Authorization: resolving an [`Identity`] to the scopes it holds.
//!
//! Scopes come from groups. A user's member id is its uid; an application's member id is its
//! API key revoke id, and an application additionally holds the scopes stored on its key.
//! Nothing is cached: every check reads the directory again, so membership changes take
//! effect on the next request.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    auth::{
        pattern::member_entry_matches,
        permissions::{Permissions, flatten},
    },
    directory::{ApiKeyStore, GroupDirectory},
    errors::Result,
    types::{GrantedScopes, Identity, PrincipalType, Scope, scopes},
};

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn get_scopes(&self, identity: &Identity) -> Result<GrantedScopes>;

    /// Required scopes the identity lacks, in required order.
    async fn missing_scopes(&self, identity: &Identity, required: &[Scope]) -> Result<Vec<Scope>> {
        if required.is_empty() {
            return Ok(Vec::new());
        }
        let granted = self.get_scopes(identity).await?;
        Ok(granted.missing(required).into_iter().cloned().collect())
    }

    /// True iff every required scope is granted. An empty requirement always passes.
    async fn has_scopes(&self, identity: &Identity, required: &[Scope]) -> Result<bool> {
        Ok(self.missing_scopes(identity, required).await?.is_empty())
    }
}

/// Scopes from group membership, plus API key scopes for applications.
pub struct GroupAuthorizer {
    groups: Arc<dyn GroupDirectory>,
    api_keys: Arc<dyn ApiKeyStore>,
}

impl GroupAuthorizer {
    pub fn new(groups: Arc<dyn GroupDirectory>, api_keys: Arc<dyn ApiKeyStore>) -> Self {
        Self { groups, api_keys }
    }
}

#[async_trait]
impl Authorizer for GroupAuthorizer {
    #[instrument(skip(self), fields(uid = %identity.uid))]
    async fn get_scopes(&self, identity: &Identity) -> Result<GrantedScopes> {
        let mut sources: Vec<Permissions> = self
            .groups
            .get_groups_by_member(&identity.uid)
            .await?
            .into_iter()
            // Re-check each entry here so a loose directory cannot widen access
            .filter(|group| group.members.iter().any(|entry| member_entry_matches(&identity.uid, entry)))
            .map(|group| Permissions::global(group.scopes))
            .collect();

        if identity.principal_type == PrincipalType::Application {
            // A revoked key keeps no scopes of its own
            if let Some(key) = self.api_keys.find_by_revoke_id(&identity.uid).await? {
                sources.push(Permissions::global(key.scopes));
            }
        }

        let effective = flatten(&sources);
        debug!("Resolved {} scopes from {} sources", effective.scopes.len(), sources.len());
        Ok(GrantedScopes {
            global_scopes: effective.scopes,
        })
    }
}

/// Grants everything. Paired with guest authentication when auth is disabled.
///
/// Reports every built-in scope as granted; scope checks pass for any scope name.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAuthorized;

#[async_trait]
impl Authorizer for AlwaysAuthorized {
    async fn get_scopes(&self, _identity: &Identity) -> Result<GrantedScopes> {
        Ok(GrantedScopes {
            global_scopes: scopes::ALL.iter().map(|scope| scope.to_string()).collect(),
        })
    }

    async fn missing_scopes(&self, _identity: &Identity, _required: &[Scope]) -> Result<Vec<Scope>> {
        Ok(Vec::new())
    }
}

/// Pick the authorizer matching the authentication mode.
pub fn authorizer_for(disabled: bool, groups: Arc<dyn GroupDirectory>, api_keys: Arc<dyn ApiKeyStore>) -> Arc<dyn Authorizer> {
    if disabled {
        Arc::new(AlwaysAuthorized)
    } else {
        Arc::new(GroupAuthorizer::new(groups, api_keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        directory::{ApiKeyManagement, Group, GroupManagement, InMemoryApiKeys, InMemoryGroups, NewGroup},
        errors::Error,
    };
    use chrono::Utc;

    fn scopes(items: &[&str]) -> Vec<Scope> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn add_group(groups: &InMemoryGroups, members: &[&str], granted: &[&str]) {
        groups
            .create_group(
                "owner@example.com",
                NewGroup {
                    label: "g".to_string(),
                    members: scopes(members),
                    scopes: scopes(granted),
                    resources: Vec::new(),
                },
                None,
            )
            .await
            .unwrap();
    }

    fn authorizer(groups: Arc<InMemoryGroups>, api_keys: Arc<InMemoryApiKeys>) -> GroupAuthorizer {
        GroupAuthorizer::new(groups, api_keys)
    }

    #[tokio::test]
    async fn test_user_scopes_union_over_groups() {
        let groups = Arc::new(InMemoryGroups::new());
        add_group(&groups, &["*@*"], &[]).await;
        add_group(&groups, &["*@example.com"], &["collection.read"]).await;
        add_group(&groups, &["john@example.com"], &["collection.read", "collection.write"]).await;
        add_group(&groups, &["*@other.com"], &["settings.write"]).await;

        let authorizer = authorizer(groups, Arc::new(InMemoryApiKeys::new("s")));
        let granted = authorizer.get_scopes(&Identity::user("john@example.com")).await.unwrap();

        assert_eq!(
            granted.global_scopes.into_iter().collect::<Vec<_>>(),
            scopes(&["collection.read", "collection.write"])
        );
    }

    #[tokio::test]
    async fn test_missing_scopes_and_has_scopes() {
        let groups = Arc::new(InMemoryGroups::new());
        add_group(&groups, &["a@x.com"], &["a"]).await;
        let authorizer = authorizer(groups, Arc::new(InMemoryApiKeys::new("s")));
        let identity = Identity::user("a@x.com");

        assert_eq!(authorizer.missing_scopes(&identity, &scopes(&["a", "b"])).await.unwrap(), scopes(&["b"]));
        assert!(!authorizer.has_scopes(&identity, &scopes(&["a", "b"])).await.unwrap());
        assert!(authorizer.has_scopes(&identity, &scopes(&["a"])).await.unwrap());
        assert!(authorizer.has_scopes(&identity, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_identity_without_groups_has_no_scopes() {
        let authorizer = authorizer(Arc::new(InMemoryGroups::new()), Arc::new(InMemoryApiKeys::new("s")));
        let identity = Identity::user("nobody@nowhere.com");

        assert!(authorizer.get_scopes(&identity).await.unwrap().global_scopes.is_empty());
        assert!(authorizer.has_scopes(&identity, &[]).await.unwrap());
        assert!(!authorizer.has_scopes(&identity, &scopes(&["a"])).await.unwrap());
    }

    #[tokio::test]
    async fn test_application_gets_key_scopes_and_group_scopes() {
        let groups = Arc::new(InMemoryGroups::new());
        let api_keys = Arc::new(InMemoryApiKeys::new("s"));
        let key = api_keys.create(scopes(&["llm.run"])).await.unwrap();
        add_group(&groups, &[key.revoke_id.as_str()], &["collection.read"]).await;
        // Applications are not email shaped, so catch-all user groups never apply
        add_group(&groups, &["*@*"], &["settings.write"]).await;

        let authorizer = authorizer(groups, api_keys.clone());
        let identity = Identity::application(key.revoke_id.clone());
        let granted = authorizer.get_scopes(&identity).await.unwrap();

        assert_eq!(
            granted.global_scopes.into_iter().collect::<Vec<_>>(),
            scopes(&["collection.read", "llm.run"])
        );

        api_keys.revoke(&key.revoke_id).await.unwrap();
        let granted = authorizer.get_scopes(&identity).await.unwrap();
        assert!(!granted.contains("llm.run"));
    }

    #[tokio::test]
    async fn test_membership_changes_apply_immediately() {
        let groups = Arc::new(InMemoryGroups::new());
        let authorizer = authorizer(groups.clone(), Arc::new(InMemoryApiKeys::new("s")));
        let identity = Identity::user("late@example.com");

        assert!(!authorizer.has_scopes(&identity, &scopes(&["a"])).await.unwrap());
        add_group(&groups, &["*@example.com"], &["a"]).await;
        assert!(authorizer.has_scopes(&identity, &scopes(&["a"])).await.unwrap());
    }

    /// Directory that returns every group regardless of member.
    struct LooseDirectory(Vec<Group>);

    #[async_trait]
    impl GroupDirectory for LooseDirectory {
        async fn get_groups_by_member(&self, _member: &str) -> Result<Vec<Group>> {
            Ok(self.0.clone())
        }

        async fn list_all_groups(&self) -> Result<Vec<Group>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_non_matching_groups_from_directory_are_filtered() {
        let group = |members: &[&str], granted: &[&str]| Group {
            id: "g".to_string(),
            owner: "o".to_string(),
            label: "g".to_string(),
            members: scopes(members),
            scopes: scopes(granted),
            resources: Vec::new(),
            created_at: Utc::now(),
        };
        let directory = LooseDirectory(vec![group(&["john*@example.com"], &["a"]), group(&["*@example.com"], &["b"])]);
        let authorizer = GroupAuthorizer::new(Arc::new(directory), Arc::new(InMemoryApiKeys::new("s")));

        let granted = authorizer.get_scopes(&Identity::user("johnny@example.com")).await.unwrap();
        assert_eq!(granted.global_scopes.into_iter().collect::<Vec<_>>(), scopes(&["b"]));
    }

    /// Directory that is always unavailable.
    struct BrokenDirectory;

    #[async_trait]
    impl GroupDirectory for BrokenDirectory {
        async fn get_groups_by_member(&self, _member: &str) -> Result<Vec<Group>> {
            Err(Error::Internal {
                operation: "query groups".to_string(),
            })
        }

        async fn list_all_groups(&self) -> Result<Vec<Group>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let authorizer = GroupAuthorizer::new(Arc::new(BrokenDirectory), Arc::new(InMemoryApiKeys::new("s")));
        let result = authorizer.has_scopes(&Identity::user("a@b.com"), &scopes(&["a"])).await;
        assert!(matches!(result, Err(Error::Internal { .. })));
    }

    #[tokio::test]
    async fn test_always_authorized() {
        let authorizer = authorizer_for(true, Arc::new(InMemoryGroups::new()), Arc::new(InMemoryApiKeys::new("s")));
        assert!(
            authorizer
                .has_scopes(&Identity::user("guest-1"), &scopes(&["settings.write", "anything"]))
                .await
                .unwrap()
        );

        let granted = authorizer.get_scopes(&Identity::user("guest-1")).await.unwrap();
        assert_eq!(granted.global_scopes.len(), crate::types::scopes::ALL.len());
        assert!(granted.contains("settings.write"));
    }
}
