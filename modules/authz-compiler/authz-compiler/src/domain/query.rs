//! Get, list, indexed-query and relational-query decisions.
//!
//! Roles on key attributes are pushed into the key condition: a supplied
//! key argument that matches the caller authorizes outright, an unsupplied
//! one is filled in from the caller's claim. All other dynamic roles build
//! an OR-combined post-filter.

use authz_compiler_sdk::{AuthorizationOutcome, JoinSide, Operation, Strategy};
use authz_security::{FilterExpr, RequestContext, filter_keys};
use serde_json::{Map, Value};
use tracing::debug;

use super::claims::ClaimResolver;
use super::predicates::{group_clauses, group_value_matches, owner_clauses, push_unique};
use super::roles::{ClassifiedRoles, KeyKind, KeyRole, passes_gate};
use crate::config::KeyClaimSelection;

enum KeyDecision {
    /// Supplied key value identifies the caller.
    Matched,
    /// Key value not supplied; the runtime must set it.
    Patched { field: String, value: Value },
    /// Supplied key value names someone else.
    Mismatched(Vec<FilterExpr>),
    /// Role cannot use the key condition and contributes a filter instead.
    Filter(Vec<FilterExpr>),
    /// Claim missing for this request.
    Skipped,
}

/// Decide a keyed read with the dynamic roles of the caller's branch.
#[must_use]
pub fn evaluate(
    operation: Operation,
    roles: &ClassifiedRoles,
    claims: &ClaimResolver,
    selection: KeyClaimSelection,
    ctx: &RequestContext,
) -> AuthorizationOutcome {
    let caller_groups = claims.caller_groups(ctx);
    let has_other_roles = roles.dynamic_count() > 1;
    let mut clauses = Vec::new();
    let mut patch: Option<(String, Value)> = None;

    for key_role in &roles.key_roles {
        if !passes_gate(&key_role.role, operation, &caller_groups) {
            continue;
        }
        match key_decision(key_role, claims, selection, ctx) {
            KeyDecision::Matched => return AuthorizationOutcome::allow(),
            KeyDecision::Patched { field, value } => {
                patch.get_or_insert((field, value));
            }
            KeyDecision::Mismatched(new) => {
                if has_other_roles {
                    push_unique(&mut clauses, new);
                } else {
                    debug!(
                        operation = %operation,
                        reason = "key argument does not identify the caller",
                        "read denied"
                    );
                    return AuthorizationOutcome::deny();
                }
            }
            KeyDecision::Filter(new) => push_unique(&mut clauses, new),
            KeyDecision::Skipped => {}
        }
    }

    if let Some((field, value)) = patch {
        let mut args = Map::new();
        args.insert(field, value);
        return AuthorizationOutcome::allow_with_patch(args);
    }

    for role in &roles.filter_roles {
        if !passes_gate(role, operation, &caller_groups) {
            continue;
        }
        if role.strategy == Strategy::Groups {
            if let Some(groups) = claims.group_claim(role, ctx) {
                push_unique(&mut clauses, group_clauses(role, &groups));
            }
        } else if let Some(claim) = claims.owner_claim(role, ctx) {
            push_unique(&mut clauses, owner_clauses(role, &claim));
        }
    }

    if let Some(filter) = FilterExpr::or_all(clauses) {
        AuthorizationOutcome::filtered(filter)
    } else {
        debug!(operation = %operation, reason = "no role produced a filter", "read denied");
        AuthorizationOutcome::deny()
    }
}

fn key_decision(
    key_role: &KeyRole,
    claims: &ClaimResolver,
    selection: KeyClaimSelection,
    ctx: &RequestContext,
) -> KeyDecision {
    let role = &key_role.role;
    let Some(entity) = role.entity.as_deref() else {
        return KeyDecision::Skipped;
    };
    let supplied = match &key_role.join {
        Some(join) if join.side == JoinSide::Source => ctx
            .source()
            .and_then(|source| source.get(&join.field))
            .filter(|v| !v.is_null()),
        Some(join) => ctx.argument(&join.field),
        None => ctx.argument(entity),
    };

    if role.strategy == Strategy::Groups {
        let Some(groups) = claims.group_claim(role, ctx) else {
            return KeyDecision::Skipped;
        };
        return match supplied {
            Some(value)
                if pinned_value(value, key_role.kind)
                    .is_some_and(|v| group_value_matches(v, &groups)) =>
            {
                KeyDecision::Matched
            }
            Some(_) => KeyDecision::Mismatched(group_clauses(role, &groups)),
            None => KeyDecision::Filter(group_clauses(role, &groups)),
        };
    }

    let Some(claim) = claims.owner_claim(role, ctx) else {
        return KeyDecision::Skipped;
    };
    match supplied {
        Some(value) if pinned_value(value, key_role.kind).is_some_and(|v| claim.matches(v)) => {
            KeyDecision::Matched
        }
        Some(_) => KeyDecision::Mismatched(owner_clauses(role, &claim)),
        None => {
            let value = match key_role.kind {
                KeyKind::Partition => claim.joined().clone(),
                KeyKind::Sort => {
                    let selected = match selection {
                        KeyClaimSelection::Last => claim.last_segment(),
                        KeyClaimSelection::Joined => claim.joined(),
                    };
                    let mut condition = Map::new();
                    condition.insert(filter_keys::EQ.to_owned(), selected.clone());
                    Value::Object(condition)
                }
            };
            KeyDecision::Patched {
                field: entity.to_owned(),
                value,
            }
        }
    }
}

/// Single value a supplied key argument pins the key to.
///
/// Sort keys arrive as key conditions; only `{eq: v}` pins one value, any
/// other operator ranges over several and cannot identify the caller.
fn pinned_value(value: &Value, kind: KeyKind) -> Option<&Value> {
    match (kind, value) {
        (KeyKind::Sort, Value::Object(condition)) => condition
            .get(filter_keys::EQ)
            .filter(|_| condition.len() == 1),
        _ => Some(value),
    }
}
