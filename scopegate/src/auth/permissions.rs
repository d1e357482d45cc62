//! Flattening of per-group permission sets into one effective permission set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::Scope;

/// Scopes granted on one specific resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermissions {
    pub id: String,
    pub scopes: BTreeSet<Scope>,
}

/// Global scopes plus per-resource scopes.
///
/// Scopes are sets; `resources` holds at most one entry per id once flattened. Output ordering
/// (sorted scopes, resources sorted by id) is stable but carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub scopes: BTreeSet<Scope>,
    pub resources: Vec<ResourcePermissions>,
}

impl Permissions {
    /// Global-only permissions, the shape groups and API keys contribute today.
    pub fn global<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
        }
    }
}

/// Union every input's global scopes, and group resource scopes by resource id.
pub fn flatten<'a, I>(groups: I) -> Permissions
where
    I: IntoIterator<Item = &'a Permissions>,
{
    let mut scopes = BTreeSet::new();
    let mut resources: BTreeMap<&str, BTreeSet<Scope>> = BTreeMap::new();

    for group in groups {
        scopes.extend(group.scopes.iter().cloned());
        for resource in &group.resources {
            resources.entry(resource.id.as_str()).or_default().extend(resource.scopes.iter().cloned());
        }
    }

    Permissions {
        scopes,
        resources: resources
            .into_iter()
            .map(|(id, scopes)| ResourcePermissions { id: id.to_string(), scopes })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<Scope> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn resource(id: &str, scopes: &[&str]) -> ResourcePermissions {
        ResourcePermissions {
            id: id.to_string(),
            scopes: set(scopes),
        }
    }

    #[test]
    fn test_flatten_permissions() {
        let source = vec![
            Permissions::global(["can_read_x"]),
            Permissions::global(["can_write_x"]),
            Permissions {
                scopes: set(&["can_read_x"]),
                resources: vec![resource("resource_a", &["read"])],
            },
            Permissions {
                scopes: set(&["can_read_y"]),
                resources: vec![resource("resource_a", &["write"]), resource("resource_b", &["write"])],
            },
            Permissions {
                scopes: set(&[]),
                resources: vec![resource("resource_c", &["read"])],
            },
        ];

        let result = flatten(&source);

        assert_eq!(result.scopes, set(&["can_read_x", "can_write_x", "can_read_y"]));
        assert_eq!(
            result.resources,
            vec![
                resource("resource_a", &["read", "write"]),
                resource("resource_b", &["write"]),
                resource("resource_c", &["read"]),
            ]
        );
    }

    #[test]
    fn test_flatten_merges_duplicate_resource_ids() {
        let source = vec![
            Permissions::global(["x"]),
            Permissions::global(["y"]),
            Permissions {
                scopes: set(&["x"]),
                resources: vec![resource("r", &["read"])],
            },
            Permissions {
                scopes: set(&[]),
                resources: vec![resource("r", &["write"])],
            },
        ];

        let result = flatten(&source);

        assert_eq!(result.scopes, set(&["x", "y"]));
        assert_eq!(result.resources, vec![resource("r", &["read", "write"])]);
    }

    #[test]
    fn test_flatten_single_group_is_identity() {
        let group = Permissions {
            scopes: set(&["settings.read", "settings.write"]),
            resources: vec![resource("a", &["read"]), resource("b", &["read", "write"])],
        };

        assert_eq!(flatten([&group]), group);
    }

    #[test]
    fn test_flatten_is_order_independent() {
        let a = Permissions {
            scopes: set(&["a"]),
            resources: vec![resource("r1", &["read"])],
        };
        let b = Permissions {
            scopes: set(&["b", "a"]),
            resources: vec![resource("r2", &["write"]), resource("r1", &["write"])],
        };

        assert_eq!(flatten([&a, &b]), flatten([&b, &a]));
    }

    #[test]
    fn test_flatten_empty_input() {
        let empty: Vec<Permissions> = Vec::new();
        assert_eq!(flatten(&empty), Permissions::default());
    }
}
