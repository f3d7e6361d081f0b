//! Role classification.
//!
//! Roles are grouped per provider branch (the IAM branch also carries
//! identity-pool roles) and split into static and dynamic roles. For keyed
//! reads, dynamic roles are further split by whether their entity is a key
//! attribute of the queried table, index or join.

use std::collections::{BTreeMap, HashMap};

use authz_compiler_sdk::{AuthRole, IndexKeySchema, JoinTarget, Operation, Provider, RelationSpec, Strategy};
use authz_security::AuthType;
use serde_json::Value;
use tracing::warn;

/// Provider branch a role is evaluated in.
#[must_use]
pub fn branch_of(provider: Provider) -> AuthType {
    match provider {
        Provider::ApiKey => AuthType::ApiKey,
        Provider::Lambda => AuthType::Lambda,
        Provider::Iam | Provider::IdentityPool => AuthType::Iam,
        Provider::UserPools => AuthType::UserPools,
        Provider::Oidc => AuthType::Oidc,
    }
}

/// `true` unless `role` is gated for `operation` and the caller belongs to
/// none of the gating groups.
#[must_use]
pub fn passes_gate(role: &AuthRole, operation: Operation, caller_groups: &[Value]) -> bool {
    role.gate_for(operation).is_none_or(|gate| {
        caller_groups
            .iter()
            .filter_map(Value::as_str)
            .any(|group| gate.contains(group))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Partition,
    Sort,
}

/// Key attributes a keyed read can push a claim into.
#[derive(Debug, Clone)]
pub struct KeyAttributes {
    keys: IndexKeySchema,
    joins: BTreeMap<String, JoinTarget>,
}

impl KeyAttributes {
    #[must_use]
    pub fn new(keys: IndexKeySchema, relation: Option<&RelationSpec>) -> Self {
        Self {
            keys,
            joins: relation.map(|r| r.join.clone()).unwrap_or_default(),
        }
    }

    /// Key kind of `entity`; join fields that are not table keys count as
    /// partition-style equality terms.
    #[must_use]
    pub fn kind_of(&self, entity: &str) -> Option<KeyKind> {
        if self.keys.is_partition_key(entity) {
            Some(KeyKind::Partition)
        } else if self.keys.is_sort_key(entity) {
            Some(KeyKind::Sort)
        } else if self.joins.contains_key(entity) {
            Some(KeyKind::Partition)
        } else {
            None
        }
    }

    #[must_use]
    pub fn join_for(&self, entity: &str) -> Option<&JoinTarget> {
        self.joins.get(entity)
    }
}

/// A dynamic role whose entity is a key attribute.
#[derive(Debug, Clone)]
pub struct KeyRole {
    pub role: AuthRole,
    pub kind: KeyKind,
    /// Where a relational query finds the supplied value.
    pub join: Option<JoinTarget>,
}

/// Roles of one provider branch.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedRoles {
    /// A `private` role is present.
    pub has_private: bool,
    /// `public`, `custom` and static `groups` roles.
    pub static_roles: Vec<AuthRole>,
    pub owner_roles: Vec<AuthRole>,
    pub group_roles: Vec<AuthRole>,
    /// Keyed reads only: dynamic roles on key attributes.
    pub key_roles: Vec<KeyRole>,
    /// Keyed reads only: dynamic roles on ordinary attributes.
    pub filter_roles: Vec<AuthRole>,
}

impl ClassifiedRoles {
    #[must_use]
    pub fn dynamic_count(&self) -> usize {
        self.owner_roles.len() + self.group_roles.len()
    }

    #[must_use]
    pub fn has_dynamic(&self) -> bool {
        self.dynamic_count() > 0
    }

    fn push(&mut self, role: &AuthRole) {
        match role.strategy {
            Strategy::Private => self.has_private = true,
            Strategy::Public | Strategy::Custom => self.static_roles.push(role.clone()),
            Strategy::Groups | Strategy::Owner if role.entity.is_none() => {
                warn!(
                    provider = ?role.provider,
                    strategy = ?role.strategy,
                    "dropping role without entity"
                );
            }
            Strategy::Groups if role.static_role => self.static_roles.push(role.clone()),
            Strategy::Groups => self.group_roles.push(role.clone()),
            Strategy::Owner => self.owner_roles.push(role.clone()),
        }
    }

    fn split_keys(&mut self, keys: &KeyAttributes) {
        for role in self.owner_roles.iter().chain(&self.group_roles) {
            let entity = role.entity.as_deref().unwrap_or_default();
            match keys.kind_of(entity) {
                Some(kind) => self.key_roles.push(KeyRole {
                    role: role.clone(),
                    kind,
                    join: keys.join_for(entity).cloned(),
                }),
                None => self.filter_roles.push(role.clone()),
            }
        }
    }
}

/// All roles of one rule set, classified once at compile time.
#[derive(Debug, Clone, Default)]
pub struct RoleSet {
    branches: HashMap<AuthType, ClassifiedRoles>,
    total: usize,
}

impl RoleSet {
    /// Classify `roles`; `keys` is given for keyed reads only.
    #[must_use]
    pub fn classify(roles: &[AuthRole], keys: Option<&KeyAttributes>) -> Self {
        let mut branches: HashMap<AuthType, ClassifiedRoles> = HashMap::new();
        for role in roles {
            branches
                .entry(branch_of(role.provider))
                .or_default()
                .push(role);
        }
        if let Some(keys) = keys {
            for classified in branches.values_mut() {
                classified.split_keys(keys);
            }
        }
        Self {
            branches,
            total: roles.len(),
        }
    }

    #[must_use]
    pub fn branch(&self, auth_type: AuthType) -> Option<&ClassifiedRoles> {
        self.branches.get(&auth_type)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use authz_compiler_sdk::{JoinSide, KeySchema};
    use serde_json::json;

    #[test]
    fn groups_roles_by_branch_and_strategy() {
        let roles = vec![
            AuthRole::private(Provider::UserPools),
            AuthRole::static_group(Provider::UserPools, "cognito:groups", "Admin"),
            AuthRole::owner(Provider::UserPools, "sub", "owner"),
            AuthRole::groups(Provider::UserPools, "cognito:groups", "editors"),
            AuthRole::public(Provider::ApiKey),
            AuthRole::private(Provider::IdentityPool),
        ];
        let set = RoleSet::classify(&roles, None);

        let pools = set.branch(AuthType::UserPools).unwrap();
        assert!(pools.has_private);
        assert_eq!(pools.static_roles.len(), 1);
        assert_eq!(pools.owner_roles.len(), 1);
        assert_eq!(pools.group_roles.len(), 1);
        assert!(pools.key_roles.is_empty());

        assert_eq!(set.branch(AuthType::ApiKey).unwrap().static_roles.len(), 1);
        assert!(set.branch(AuthType::Iam).unwrap().has_private);
        assert!(set.branch(AuthType::Oidc).is_none());
    }

    #[test]
    fn drops_dynamic_role_without_entity() {
        let mut role = AuthRole::owner(Provider::UserPools, "sub", "owner");
        role.entity = None;
        let set = RoleSet::classify(&[role], None);

        assert!(!set.branch(AuthType::UserPools).unwrap().has_dynamic());
        assert!(!set.is_empty());
    }

    #[test]
    fn splits_key_roles_from_filter_roles() {
        let schema = KeySchema::new("id", &[]).with_index("byOwner", "owner", &["editor"]);
        let keys = KeyAttributes::new(schema.keys_for(Some("byOwner")).unwrap(), None);
        let roles = vec![
            AuthRole::owner(Provider::UserPools, "sub", "owner"),
            AuthRole::owner(Provider::UserPools, "sub", "editor"),
            AuthRole::owner(Provider::UserPools, "sub", "reviewer"),
        ];
        let pools = RoleSet::classify(&roles, Some(&keys))
            .branch(AuthType::UserPools)
            .cloned()
            .unwrap();

        let kinds: Vec<_> = pools.key_roles.iter().map(|k| k.kind).collect();
        assert_eq!(kinds, vec![KeyKind::Partition, KeyKind::Sort]);
        assert_eq!(pools.filter_roles.len(), 1);
    }

    #[test]
    fn join_fields_are_key_attributes() {
        let relation = RelationSpec::default().join("postOwner", JoinSide::Source, "owner");
        let keys = KeyAttributes::new(KeySchema::new("id", &[]).keys_for(None).unwrap(), Some(&relation));

        assert_eq!(keys.kind_of("postOwner"), Some(KeyKind::Partition));
        assert_eq!(keys.join_for("postOwner").unwrap().field, "owner");
        assert_eq!(keys.kind_of("title"), None);
    }

    #[test]
    fn gate_requires_membership() {
        let role = AuthRole::owner(Provider::UserPools, "sub", "owner").gated(Operation::Update, &["editors"]);

        assert!(passes_gate(&role, Operation::Update, &[json!("editors")]));
        assert!(!passes_gate(&role, Operation::Update, &[json!("viewers")]));
        assert!(!passes_gate(&role, Operation::Update, &[]));
        assert!(passes_gate(&role, Operation::Delete, &[]));
    }
}
