//! Group directory: named sets of member patterns granted a set of scopes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    auth::pattern::{is_wildcard_member_pattern, member_entry_matches},
    errors::Result,
    types::{GroupId, Scope},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub owner: String,
    pub label: String,
    /// Literal identifiers and/or wildcard member patterns
    pub members: Vec<String>,
    pub scopes: Vec<Scope>,
    pub resources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub label: String,
    pub members: Vec<String>,
    pub scopes: Vec<Scope>,
    pub resources: Vec<String>,
}

/// Read access used by authorization.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Groups listing `member` literally, followed by groups with a wildcard entry matching it.
    async fn get_groups_by_member(&self, member: &str) -> Result<Vec<Group>>;

    async fn list_all_groups(&self) -> Result<Vec<Group>>;
}

/// Owner-scoped group management. Every operation only sees groups owned by `as_uid`.
#[async_trait]
pub trait GroupManagement: Send + Sync {
    /// Create a group. With `force_id`, creation is idempotent: an existing id is returned as is.
    async fn create_group(&self, as_uid: &str, group: NewGroup, force_id: Option<GroupId>) -> Result<GroupId>;

    async fn get_group_by_id(&self, as_uid: &str, group_id: &str) -> Result<Option<Group>>;

    async fn get_owned_groups(&self, as_uid: &str) -> Result<Vec<Group>>;

    async fn set_group_members(&self, as_uid: &str, group_id: &str, members: Vec<String>) -> Result<bool>;

    async fn set_group_scopes(&self, as_uid: &str, group_id: &str, scopes: Vec<Scope>) -> Result<bool>;

    async fn add_group_resource(&self, as_uid: &str, group_id: &str, resource: &str) -> Result<bool>;

    async fn remove_group_resource(&self, as_uid: &str, group_id: &str, resource: &str) -> Result<bool>;

    async fn delete_group(&self, as_uid: &str, group_id: &str) -> Result<bool>;
}

/// Process-local group storage.
#[derive(Debug, Default)]
pub struct InMemoryGroups {
    groups: DashMap<GroupId, Group>,
}

impl InMemoryGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut groups: Vec<Group>) -> Vec<Group> {
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        groups
    }

    /// Apply `update` to a group owned by `as_uid`. Returns whether such a group existed.
    fn update_owned(&self, as_uid: &str, group_id: &str, update: impl FnOnce(&mut Group)) -> bool {
        match self.groups.get_mut(group_id) {
            Some(mut group) if group.owner == as_uid => {
                update(&mut group);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroups {
    #[instrument(skip(self))]
    async fn get_groups_by_member(&self, member: &str) -> Result<Vec<Group>> {
        if member.is_empty() {
            return Ok(Vec::new());
        }

        let all = Self::sorted(self.groups.iter().map(|entry| entry.value().clone()).collect());
        let (direct, rest): (Vec<Group>, Vec<Group>) = all.into_iter().partition(|group| group.members.iter().any(|m| m == member));
        let indirect = rest.into_iter().filter(|group| {
            group
                .members
                .iter()
                .filter(|entry| is_wildcard_member_pattern(entry))
                .any(|entry| member_entry_matches(member, entry))
        });

        let groups: Vec<Group> = direct.into_iter().chain(indirect).collect();
        debug!("Member matched {} groups", groups.len());
        Ok(groups)
    }

    async fn list_all_groups(&self) -> Result<Vec<Group>> {
        Ok(Self::sorted(self.groups.iter().map(|entry| entry.value().clone()).collect()))
    }
}

#[async_trait]
impl GroupManagement for InMemoryGroups {
    async fn create_group(&self, as_uid: &str, group: NewGroup, force_id: Option<GroupId>) -> Result<GroupId> {
        let id = force_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        self.groups.entry(id.clone()).or_insert_with(|| Group {
            id: id.clone(),
            owner: as_uid.to_string(),
            label: group.label,
            members: group.members,
            scopes: group.scopes,
            resources: group.resources,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_group_by_id(&self, as_uid: &str, group_id: &str) -> Result<Option<Group>> {
        Ok(self
            .groups
            .get(group_id)
            .filter(|group| group.owner == as_uid)
            .map(|group| group.value().clone()))
    }

    async fn get_owned_groups(&self, as_uid: &str) -> Result<Vec<Group>> {
        Ok(Self::sorted(
            self.groups
                .iter()
                .filter(|entry| entry.owner == as_uid)
                .map(|entry| entry.value().clone())
                .collect(),
        ))
    }

    async fn set_group_members(&self, as_uid: &str, group_id: &str, members: Vec<String>) -> Result<bool> {
        Ok(self.update_owned(as_uid, group_id, |group| group.members = members))
    }

    async fn set_group_scopes(&self, as_uid: &str, group_id: &str, scopes: Vec<Scope>) -> Result<bool> {
        Ok(self.update_owned(as_uid, group_id, |group| group.scopes = scopes))
    }

    async fn add_group_resource(&self, as_uid: &str, group_id: &str, resource: &str) -> Result<bool> {
        Ok(self.update_owned(as_uid, group_id, |group| {
            if !group.resources.iter().any(|r| r == resource) {
                group.resources.push(resource.to_string());
            }
        }))
    }

    async fn remove_group_resource(&self, as_uid: &str, group_id: &str, resource: &str) -> Result<bool> {
        Ok(self.update_owned(as_uid, group_id, |group| group.resources.retain(|r| r != resource)))
    }

    async fn delete_group(&self, as_uid: &str, group_id: &str) -> Result<bool> {
        Ok(self.groups.remove_if(group_id, |_, group| group.owner == as_uid).is_some())
    }
}
