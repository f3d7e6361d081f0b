//! Already-parsed authorization rules, as produced by the rule parser.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Identity provider a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    ApiKey,
    /// Lambda (function) authorizer.
    Lambda,
    Iam,
    UserPools,
    Oidc,
    /// IAM principals federated through an identity pool.
    IdentityPool,
}

/// How a rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Public,
    Private,
    Owner,
    Groups,
    Custom,
}

/// An operation the data API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Get,
    List,
    /// Query against a secondary index.
    Query,
    /// Read of related records through a relationship field.
    Relational,
    Subscribe,
    FieldRead,
}

impl Operation {
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }

    /// Reads that go through the key-aware query evaluator.
    #[must_use]
    pub fn is_keyed_read(self) -> bool {
        matches!(self, Self::Get | Self::List | Self::Query | Self::Relational)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Get => "get",
            Self::List => "list",
            Self::Query => "query",
            Self::Relational => "relational",
            Self::Subscribe => "subscribe",
            Self::FieldRead => "fieldRead",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorization rule attached to a type, operation or field.
///
/// `static_role` rules do not depend on record data (`public`, `private`,
/// `custom`, and `groups` with a literal group in `entity`). Dynamic rules
/// compare the record field named by `entity` with the caller's `claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRole {
    pub provider: Provider,
    pub strategy: Strategy,
    #[serde(rename = "static", default)]
    pub static_role: bool,
    /// Claim path, optionally delimiter-joined (e.g. `"sub::username"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
    /// Record field (or query argument) compared against the claim; for static
    /// group rules, the literal group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default)]
    pub entity_is_list: bool,
    /// Groups the caller must belong to before this owner rule is considered
    /// for a given operation.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub operation_groups: HashMap<Operation, BTreeSet<String>>,
}

impl AuthRole {
    fn base(provider: Provider, strategy: Strategy, static_role: bool) -> Self {
        Self {
            provider,
            strategy,
            static_role,
            claim: None,
            entity: None,
            entity_is_list: false,
            operation_groups: HashMap::new(),
        }
    }

    #[must_use]
    pub fn public(provider: Provider) -> Self {
        Self::base(provider, Strategy::Public, true)
    }

    #[must_use]
    pub fn private(provider: Provider) -> Self {
        Self::base(provider, Strategy::Private, true)
    }

    /// Lambda-authorizer rule.
    #[must_use]
    pub fn custom() -> Self {
        Self::base(Provider::Lambda, Strategy::Custom, true)
    }

    /// Static group rule: members of `group` (read from `claim`) are allowed.
    #[must_use]
    pub fn static_group(provider: Provider, claim: &str, group: &str) -> Self {
        Self {
            claim: Some(claim.to_owned()),
            entity: Some(group.to_owned()),
            ..Self::base(provider, Strategy::Groups, true)
        }
    }

    /// Owner rule: the record field `entity` must hold the caller's `claim`.
    #[must_use]
    pub fn owner(provider: Provider, claim: &str, entity: &str) -> Self {
        Self {
            claim: Some(claim.to_owned()),
            entity: Some(entity.to_owned()),
            ..Self::base(provider, Strategy::Owner, false)
        }
    }

    /// Dynamic group rule: the record field `entity` names the allowed group(s).
    #[must_use]
    pub fn groups(provider: Provider, claim: &str, entity: &str) -> Self {
        Self {
            claim: Some(claim.to_owned()),
            entity: Some(entity.to_owned()),
            ..Self::base(provider, Strategy::Groups, false)
        }
    }

    /// Mark `entity` as a list field (multi-owner / multi-group).
    #[must_use]
    pub fn list_entity(mut self) -> Self {
        self.entity_is_list = true;
        self
    }

    /// Require membership in one of `groups` before this rule applies to `operation`.
    #[must_use]
    pub fn gated(mut self, operation: Operation, groups: &[&str]) -> Self {
        self.operation_groups
            .entry(operation)
            .or_default()
            .extend(groups.iter().map(|g| (*g).to_owned()));
        self
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !self.static_role
    }

    /// Groups gating this rule for `operation`; empty means ungated.
    #[must_use]
    pub fn gate_for(&self, operation: Operation) -> Option<&BTreeSet<String>> {
        self.operation_groups
            .get(&operation)
            .filter(|groups| !groups.is_empty())
    }
}

/// Lookup key of a rule set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleKey {
    pub type_name: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// One catalog entry in the parser's JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    #[serde(flatten)]
    pub key: RuleKey,
    pub roles: Vec<AuthRole>,
}

/// All rule sets of an API, keyed by type, operation and (for field reads) field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RuleEntry>", into = "Vec<RuleEntry>")]
pub struct RuleCatalog {
    entries: BTreeMap<RuleKey, Vec<AuthRole>>,
}

impl RuleCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the roles of a model-level operation.
    #[must_use]
    pub fn with_rules(mut self, type_name: &str, operation: Operation, roles: Vec<AuthRole>) -> Self {
        self.insert(
            RuleKey {
                type_name: type_name.to_owned(),
                operation,
                field: None,
            },
            roles,
        );
        self
    }

    /// Register the roles guarding reads of `field` on `type_name`.
    #[must_use]
    pub fn with_field_rules(mut self, type_name: &str, field: &str, roles: Vec<AuthRole>) -> Self {
        self.insert(
            RuleKey {
                type_name: type_name.to_owned(),
                operation: Operation::FieldRead,
                field: Some(field.to_owned()),
            },
            roles,
        );
        self
    }

    pub fn insert(&mut self, key: RuleKey, roles: Vec<AuthRole>) {
        self.entries.insert(key, roles);
    }

    #[must_use]
    pub fn get(&self, key: &RuleKey) -> Option<&[AuthRole]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<RuleEntry>> for RuleCatalog {
    fn from(entries: Vec<RuleEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key, e.roles)).collect(),
        }
    }
}

impl From<RuleCatalog> for Vec<RuleEntry> {
    fn from(catalog: RuleCatalog) -> Self {
        catalog
            .entries
            .into_iter()
            .map(|(key, roles)| RuleEntry { key, roles })
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_parser_output() {
        let role: AuthRole = serde_json::from_value(json!({
            "provider": "userPools",
            "strategy": "owner",
            "static": false,
            "claim": "sub::username",
            "entity": "owner",
            "operationGroups": { "update": ["editors"] }
        }))
        .unwrap();

        assert_eq!(role.provider, Provider::UserPools);
        assert!(role.is_dynamic());
        assert!(!role.entity_is_list);
        assert_eq!(
            role.gate_for(Operation::Update).map(BTreeSet::len),
            Some(1)
        );
        assert!(role.gate_for(Operation::Delete).is_none());
    }

    #[test]
    fn empty_gate_is_ungated() {
        let mut role = AuthRole::owner(Provider::UserPools, "sub", "owner");
        role.operation_groups.insert(Operation::Update, BTreeSet::new());
        assert!(role.gate_for(Operation::Update).is_none());
    }

    #[test]
    fn catalog_loads_from_entry_list() {
        let catalog: RuleCatalog = serde_json::from_value(json!([
            {
                "typeName": "Blog",
                "operation": "update",
                "roles": [{ "provider": "userPools", "strategy": "owner", "claim": "sub", "entity": "owner" }]
            },
            {
                "typeName": "Blog",
                "operation": "fieldRead",
                "field": "secret",
                "roles": [{ "provider": "userPools", "strategy": "private", "static": true }]
            }
        ]))
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let key = RuleKey {
            type_name: "Blog".to_owned(),
            operation: Operation::FieldRead,
            field: Some("secret".to_owned()),
        };
        let roles = catalog.get(&key).unwrap();
        assert_eq!(roles[0].strategy, Strategy::Private);
        assert!(roles[0].static_role);
    }
}
