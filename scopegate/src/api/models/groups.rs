//! API request/response models for groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::pattern::is_wildcard_member_pattern,
    directory::{Group, NewGroup},
    errors::{Error, Result},
    types::{GroupId, Scope},
};

/// Request body for creating a new group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCreate {
    pub label: String,
    /// Literal identifiers (emails, API key revoke ids) or `local@domain` wildcard patterns
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembersUpdate {
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupScopesUpdate {
    pub scopes: Vec<Scope>,
}

/// Full group details returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: GroupId,
    pub owner: String,
    pub label: String,
    pub members: Vec<String>,
    pub scopes: Vec<Scope>,
    pub resources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            owner: group.owner,
            label: group.label,
            members: group.members,
            scopes: group.scopes,
            resources: group.resources,
            created_at: group.created_at,
        }
    }
}

/// Entries with a `*` must be whole-part wildcards; anything else is stored literally.
pub fn validate_members(members: &[String]) -> Result<()> {
    for member in members {
        if member.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Group members must not be empty".to_string(),
            });
        }
        if member.contains('*') && !is_wildcard_member_pattern(member) {
            return Err(Error::BadRequest {
                message: format!("Invalid member pattern '{member}': use '*' for a whole local or domain part"),
            });
        }
    }
    Ok(())
}

pub fn validate_scopes(scopes: &[Scope]) -> Result<()> {
    match scopes.iter().find(|scope| scope.is_empty() || scope.contains(char::is_whitespace)) {
        Some(scope) => Err(Error::BadRequest {
            message: format!("Invalid scope '{scope}'"),
        }),
        None => Ok(()),
    }
}

impl TryFrom<GroupCreate> for NewGroup {
    type Error = Error;

    fn try_from(create: GroupCreate) -> Result<Self> {
        if create.label.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Group label must not be empty".to_string(),
            });
        }
        validate_members(&create.members)?;
        validate_scopes(&create.scopes)?;

        Ok(NewGroup {
            label: create.label,
            members: create.members,
            scopes: create.scopes,
            resources: create.resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_member_validation() {
        assert!(validate_members(&strings(&["*@*", "*@example.com", "john@*", "john@example.com", "3f2c9a"])).is_ok());
        assert!(validate_members(&strings(&["john*@example.com"])).is_err());
        assert!(validate_members(&strings(&["*"])).is_err());
        assert!(validate_members(&strings(&[" "])).is_err());
    }

    #[test]
    fn test_scope_validation() {
        assert!(validate_scopes(&strings(&["settings.write", "llm.run"])).is_ok());
        assert!(validate_scopes(&strings(&[""])).is_err());
        assert!(validate_scopes(&strings(&["two words"])).is_err());
    }

    #[test]
    fn test_group_create_requires_label() {
        let create = GroupCreate {
            label: "  ".to_string(),
            members: vec![],
            scopes: vec![],
            resources: vec![],
        };
        assert!(NewGroup::try_from(create).is_err());
    }
}
