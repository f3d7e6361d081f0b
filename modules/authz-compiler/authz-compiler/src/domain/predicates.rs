//! Filter clauses and record checks shared by the dynamic evaluators.

use authz_compiler_sdk::AuthRole;
use authz_security::{FilterExpr, Record, RequestContext};
use serde_json::Value;

use super::claims::{ClaimResolver, ResolvedClaim};

/// One clause per distinct claim value: `Eq`, or `Contains` for list fields.
#[must_use]
pub fn owner_clauses(role: &AuthRole, claim: &ResolvedClaim) -> Vec<FilterExpr> {
    let Some(entity) = role.entity.as_deref() else {
        return Vec::new();
    };
    claim
        .candidates()
        .into_iter()
        .map(|value| {
            if role.entity_is_list {
                FilterExpr::contains(entity, value.clone())
            } else {
                FilterExpr::eq(entity, value.clone())
            }
        })
        .collect()
}

/// `In` over the caller's groups, or one `Contains` per group for list fields.
#[must_use]
pub fn group_clauses(role: &AuthRole, groups: &[Value]) -> Vec<FilterExpr> {
    let Some(entity) = role.entity.as_deref() else {
        return Vec::new();
    };
    if groups.is_empty() {
        return Vec::new();
    }
    if role.entity_is_list {
        groups
            .iter()
            .map(|group| FilterExpr::contains(entity, group.clone()))
            .collect()
    } else {
        vec![FilterExpr::r#in(entity, groups.iter().cloned())]
    }
}

/// Append clauses that are not already present.
pub fn push_unique(clauses: &mut Vec<FilterExpr>, new: impl IntoIterator<Item = FilterExpr>) {
    for clause in new {
        if !clauses.contains(&clause) {
            clauses.push(clause);
        }
    }
}

/// `true` if the record's group field (scalar or list) names one of `groups`.
#[must_use]
pub fn group_value_matches(value: &Value, groups: &[Value]) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| !item.is_null() && groups.contains(item)),
        Value::Null => false,
        scalar => groups.contains(scalar),
    }
}

/// How a dynamic role matched a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleMatch {
    /// The record field holds the caller's identity.
    Matched,
    /// The field is absent; it must be stamped with the given value.
    BackFilled { field: String, value: Value },
}

/// Owner role against a record. `back_fill` allows stamping an absent field.
#[must_use]
pub fn match_owner(
    role: &AuthRole,
    claims: &ClaimResolver,
    ctx: &RequestContext,
    record: &Record,
    back_fill: bool,
) -> Option<RoleMatch> {
    let entity = role.entity.as_deref()?;
    let claim = claims.owner_claim(role, ctx)?;
    match record.get(entity) {
        Some(value) => claim.matches(value).then_some(RoleMatch::Matched),
        None if back_fill => {
            let joined = claim.joined().clone();
            let value = if role.entity_is_list {
                Value::Array(vec![joined])
            } else {
                joined
            };
            Some(RoleMatch::BackFilled {
                field: entity.to_owned(),
                value,
            })
        }
        None => None,
    }
}

/// Dynamic group role against a record.
///
/// Back-fill of a scalar group field needs exactly one caller group.
#[must_use]
pub fn match_groups(
    role: &AuthRole,
    claims: &ClaimResolver,
    ctx: &RequestContext,
    record: &Record,
    back_fill: bool,
) -> Option<RoleMatch> {
    let entity = role.entity.as_deref()?;
    let groups = claims.group_claim(role, ctx)?;
    match record.get(entity) {
        Some(value) => group_value_matches(value, &groups).then_some(RoleMatch::Matched),
        None if back_fill => {
            let value = if role.entity_is_list {
                (!groups.is_empty()).then(|| Value::Array(groups))
            } else if let [single] = groups.as_slice() {
                Some(single.clone())
            } else {
                None
            }?;
            Some(RoleMatch::BackFilled {
                field: entity.to_owned(),
                value,
            })
        }
        None => None,
    }
}
