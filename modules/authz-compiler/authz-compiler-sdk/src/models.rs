//! Decision targets, provider configuration, key schemas and decision outcomes.

use std::collections::BTreeMap;

use authz_security::FilterExpr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rules::{Operation, Provider, RuleKey};

/// Enabled identity providers and provider-wide switches of one API.
///
/// Computed once per API; immutable while requests are evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)] // one flag per provider
pub struct ProviderConfig {
    pub api_key: bool,
    pub lambda: bool,
    pub iam: bool,
    pub user_pools: bool,
    pub oidc: bool,
    pub identity_pool: bool,

    /// IAM principals assuming one of `admin_roles` bypass all rules.
    pub admin_roles_enabled: bool,
    pub has_identity_pool_id: bool,
    /// IAM principals outside any identity pool are allowed.
    pub generic_iam_access_enabled: bool,

    pub admin_roles: Vec<String>,
    pub identity_pool_id: Option<String>,
    pub auth_role_arn: Option<String>,
    pub unauth_role_arn: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn is_enabled(&self, provider: Provider) -> bool {
        match provider {
            Provider::ApiKey => self.api_key,
            Provider::Lambda => self.lambda,
            Provider::Iam => self.iam,
            Provider::UserPools => self.user_pools,
            Provider::Oidc => self.oidc,
            Provider::IdentityPool => self.identity_pool,
        }
    }

    /// Enable `provider`.
    #[must_use]
    pub fn with(mut self, provider: Provider) -> Self {
        match provider {
            Provider::ApiKey => self.api_key = true,
            Provider::Lambda => self.lambda = true,
            Provider::Iam => self.iam = true,
            Provider::UserPools => self.user_pools = true,
            Provider::Oidc => self.oidc = true,
            Provider::IdentityPool => self.identity_pool = true,
        }
        self
    }
}

/// Partition and sort keys of a table or one of its indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexKeySchema {
    pub partition_key: String,
    #[serde(default)]
    pub sort_keys: Vec<String>,
}

impl IndexKeySchema {
    #[must_use]
    pub fn is_partition_key(&self, attribute: &str) -> bool {
        self.partition_key == attribute
    }

    #[must_use]
    pub fn is_sort_key(&self, attribute: &str) -> bool {
        self.sort_keys.iter().any(|k| k == attribute)
    }

    #[must_use]
    pub fn is_key(&self, attribute: &str) -> bool {
        self.is_partition_key(attribute) || self.is_sort_key(attribute)
    }
}

/// Key schema of a type, supplied by the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySchema {
    pub partition_key: String,
    #[serde(default)]
    pub sort_keys: Vec<String>,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexKeySchema>,
}

impl KeySchema {
    #[must_use]
    pub fn new(partition_key: &str, sort_keys: &[&str]) -> Self {
        Self {
            partition_key: partition_key.to_owned(),
            sort_keys: sort_keys.iter().map(|k| (*k).to_owned()).collect(),
            indexes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, name: &str, partition_key: &str, sort_keys: &[&str]) -> Self {
        self.indexes.insert(
            name.to_owned(),
            IndexKeySchema {
                partition_key: partition_key.to_owned(),
                sort_keys: sort_keys.iter().map(|k| (*k).to_owned()).collect(),
            },
        );
        self
    }

    /// Keys of the primary table (`None`) or of the named index.
    #[must_use]
    pub fn keys_for(&self, index: Option<&str>) -> Option<IndexKeySchema> {
        match index {
            None => Some(IndexKeySchema {
                partition_key: self.partition_key.clone(),
                sort_keys: self.sort_keys.clone(),
            }),
            Some(name) => self.indexes.get(name).cloned(),
        }
    }
}

/// Where a relational query finds the value a role's entity is compared to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinSide {
    /// The query's argument object.
    Arguments,
    /// The record the relationship is resolved from.
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTarget {
    pub side: JoinSide,
    pub field: String,
}

/// Join description of a relational query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationSpec {
    /// Index of the related type the relationship reads through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Role entity to the join side and field that holds its value.
    #[serde(default)]
    pub join: BTreeMap<String, JoinTarget>,
}

impl RelationSpec {
    #[must_use]
    pub fn through_index(index: &str) -> Self {
        Self {
            index: Some(index.to_owned()),
            join: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn join(mut self, entity: &str, side: JoinSide, field: &str) -> Self {
        self.join.insert(
            entity.to_owned(),
            JoinTarget {
                side,
                field: field.to_owned(),
            },
        );
        self
    }
}

/// What a decision procedure is compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTarget {
    pub type_name: String,
    pub operation: Operation,
    /// Index name for [`Operation::Query`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Field name for [`Operation::FieldRead`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Join description for [`Operation::Relational`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationSpec>,
}

impl DecisionTarget {
    #[must_use]
    pub fn new(type_name: &str, operation: Operation) -> Self {
        Self {
            type_name: type_name.to_owned(),
            operation,
            index: None,
            field: None,
            relation: None,
        }
    }

    #[must_use]
    pub fn field_read(type_name: &str, field: &str) -> Self {
        Self {
            field: Some(field.to_owned()),
            ..Self::new(type_name, Operation::FieldRead)
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: &str) -> Self {
        self.index = Some(index.to_owned());
        self
    }

    #[must_use]
    pub fn with_relation(mut self, relation: RelationSpec) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Catalog key of the rules guarding this target.
    #[must_use]
    pub fn rule_key(&self) -> RuleKey {
        RuleKey {
            type_name: self.type_name.clone(),
            operation: self.operation,
            field: self.field.clone(),
        }
    }
}

/// Shape hint for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterShape {
    /// A single authorization clause and no caller filter.
    Basic,
    Full,
}

/// Result of one authorization decision.
///
/// Exactly one terminal state holds:
/// - `authorized` - proceed without constraint (optionally applying `argument_patch`)
/// - `filter` - proceed, the store must apply the filter
/// - `redact` - deliver the field as null instead of failing
/// - `fatal` - reject before any store access
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationOutcome {
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_shape: Option<FilterShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_patch: Option<Map<String, Value>>,
    #[serde(default)]
    pub redact: bool,
    #[serde(default)]
    pub fatal: bool,
}

impl AuthorizationOutcome {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            authorized: true,
            ..Self::default()
        }
    }

    /// Authorized, with arguments the runtime must rewrite first. An empty
    /// patch is the same as [`AuthorizationOutcome::allow`].
    #[must_use]
    pub fn allow_with_patch(patch: Map<String, Value>) -> Self {
        Self {
            authorized: true,
            argument_patch: (!patch.is_empty()).then_some(patch),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filtered(filter: FilterExpr) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filtered_subscription(filter: FilterExpr, shape: FilterShape) -> Self {
        Self {
            filter: Some(filter),
            filter_shape: Some(shape),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn redacted() -> Self {
        Self {
            redact: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn deny() -> Self {
        Self {
            fatal: true,
            ..Self::default()
        }
    }

    /// `true` when exactly one terminal state is set and the optional parts
    /// only accompany the state they belong to.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let states = [
            self.authorized,
            self.filter.is_some(),
            self.redact,
            self.fatal,
        ];
        let exclusive = states.iter().filter(|s| **s).count() == 1;
        let patch_ok = self.argument_patch.is_none() || self.authorized;
        let shape_ok = self.filter_shape.is_none() || self.filter.is_some();
        exclusive && patch_ok && shape_ok
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_are_consistent() {
        let mut patch = Map::new();
        patch.insert("owner".to_owned(), json!("u1"));

        for outcome in [
            AuthorizationOutcome::allow(),
            AuthorizationOutcome::allow_with_patch(patch),
            AuthorizationOutcome::filtered(FilterExpr::eq("owner", "u1")),
            AuthorizationOutcome::filtered_subscription(
                FilterExpr::eq("owner", "u1"),
                FilterShape::Basic,
            ),
            AuthorizationOutcome::redacted(),
            AuthorizationOutcome::deny(),
        ] {
            assert!(outcome.is_consistent(), "inconsistent: {outcome:?}");
        }
        assert!(!AuthorizationOutcome::default().is_consistent());
    }

    #[test]
    fn empty_patch_is_plain_allow() {
        assert_eq!(
            AuthorizationOutcome::allow_with_patch(Map::new()),
            AuthorizationOutcome::allow()
        );
    }

    #[test]
    fn key_schema_resolves_index_keys() {
        let schema = KeySchema::new("id", &[]).with_index("byOwner", "owner", &["createdAt"]);

        let primary = schema.keys_for(None).unwrap();
        assert!(primary.is_partition_key("id"));

        let index = schema.keys_for(Some("byOwner")).unwrap();
        assert!(index.is_partition_key("owner"));
        assert!(index.is_sort_key("createdAt"));
        assert!(!index.is_key("title"));

        assert!(schema.keys_for(Some("missing")).is_none());
    }

    #[test]
    fn provider_config_flags() {
        let cfg = ProviderConfig::default()
            .with(Provider::UserPools)
            .with(Provider::ApiKey);
        assert!(cfg.is_enabled(Provider::UserPools));
        assert!(cfg.is_enabled(Provider::ApiKey));
        assert!(!cfg.is_enabled(Provider::Iam));
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let json_str = serde_json::to_string(&AuthorizationOutcome::deny()).unwrap();
        assert!(json_str.contains(r#""fatal":true"#));
        assert!(!json_str.contains("argumentPatch"));
    }
}
