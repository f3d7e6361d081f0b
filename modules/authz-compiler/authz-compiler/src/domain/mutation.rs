//! Create, update and delete decisions.
//!
//! Owner roles are tried first in rule order, then group roles. Writes never
//! degrade to a filter: a mutation is either authorized or fatal.

use authz_compiler_sdk::{AuthorizationOutcome, Operation};
use authz_security::{Record, RequestContext};
use serde_json::Map;
use tracing::debug;

use super::claims::ClaimResolver;
use super::predicates::{RoleMatch, match_groups, match_owner};
use super::roles::{ClassifiedRoles, passes_gate};

/// Decide a mutation with the dynamic roles of the caller's branch.
///
/// Create compares against `ctx.result` (the record about to be written) and
/// may back-fill an absent owner or group field; update and delete compare
/// against `ctx.source`.
#[must_use]
pub fn evaluate(
    operation: Operation,
    roles: &ClassifiedRoles,
    claims: &ClaimResolver,
    ctx: &RequestContext,
) -> AuthorizationOutcome {
    let is_create = operation == Operation::Create;
    let empty = Record::new();
    let record = if is_create { ctx.result() } else { ctx.source() };
    let record = record.unwrap_or(&empty);
    let caller_groups = claims.caller_groups(ctx);

    let decision = roles
        .owner_roles
        .iter()
        .filter(|role| passes_gate(role, operation, &caller_groups))
        .find_map(|role| match_owner(role, claims, ctx, record, is_create))
        .or_else(|| {
            roles
                .group_roles
                .iter()
                .find_map(|role| match_groups(role, claims, ctx, record, is_create))
        });

    match decision {
        Some(RoleMatch::Matched) => AuthorizationOutcome::allow(),
        Some(RoleMatch::BackFilled { field, value }) => {
            let mut patch = Map::new();
            patch.insert(field, value);
            AuthorizationOutcome::allow_with_patch(patch)
        }
        None => {
            debug!(operation = %operation, reason = "no dynamic role matched", "mutation denied");
            AuthorizationOutcome::deny()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::domain::roles::RoleSet;
    use authz_compiler_sdk::{AuthRole, Provider};
    use authz_security::AuthType;
    use serde_json::{Value, json};

    fn claims() -> ClaimResolver {
        ClaimResolver::from_config(&CompilerConfig::default())
    }

    fn pools(roles: &[AuthRole]) -> ClassifiedRoles {
        RoleSet::classify(roles, None)
            .branch(AuthType::UserPools)
            .cloned()
            .unwrap()
    }

    fn record(value: &Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn update_by_owner_and_by_stranger() {
        let roles = pools(&[AuthRole::owner(Provider::UserPools, "sub", "owner")]);
        let ctx = |owner: &str| {
            RequestContext::builder()
                .auth_type(AuthType::UserPools)
                .claim("sub", "u1")
                .source(record(&json!({ "owner": owner })))
                .build()
        };

        assert_eq!(
            evaluate(Operation::Update, &roles, &claims(), &ctx("u1")),
            AuthorizationOutcome::allow()
        );
        assert_eq!(
            evaluate(Operation::Update, &roles, &claims(), &ctx("u2")),
            AuthorizationOutcome::deny()
        );
    }

    #[test]
    fn create_back_fills_joined_owner() {
        let roles = pools(&[AuthRole::owner(Provider::UserPools, "sub::username", "owner")]);
        let ctx = RequestContext::builder()
            .claim("sub", "u1")
            .claim("username", "alice")
            .result(record(&json!({ "title": "hello" })))
            .build();

        let outcome = evaluate(Operation::Create, &roles, &claims(), &ctx);
        assert!(outcome.authorized);
        assert_eq!(
            outcome.argument_patch.unwrap().get("owner"),
            Some(&json!("u1::alice"))
        );
    }

    #[test]
    fn create_with_foreign_owner_is_fatal() {
        let roles = pools(&[AuthRole::owner(Provider::UserPools, "sub", "owner")]);
        let ctx = RequestContext::builder()
            .claim("sub", "u1")
            .result(record(&json!({ "owner": "u2" })))
            .build();
        assert!(evaluate(Operation::Create, &roles, &claims(), &ctx).fatal);
    }

    #[test]
    fn gated_owner_falls_through_to_groups() {
        let roles = pools(&[
            AuthRole::owner(Provider::UserPools, "sub", "owner").gated(Operation::Delete, &["editors"]),
            AuthRole::groups(Provider::UserPools, "cognito:groups", "groups").list_entity(),
        ]);
        let source = record(&json!({ "owner": "u1", "groups": ["ops"] }));

        let owner_not_editor = RequestContext::builder()
            .claim("sub", "u1")
            .claim("cognito:groups", json!(["viewers"]))
            .source(source.clone())
            .build();
        assert!(evaluate(Operation::Delete, &roles, &claims(), &owner_not_editor).fatal);

        let owner_editor = RequestContext::builder()
            .claim("sub", "u1")
            .claim("cognito:groups", json!(["editors"]))
            .source(source.clone())
            .build();
        assert!(evaluate(Operation::Delete, &roles, &claims(), &owner_editor).authorized);

        let ops_member = RequestContext::builder()
            .claim("sub", "u9")
            .claim("cognito:groups", json!(["ops"]))
            .source(source)
            .build();
        assert!(evaluate(Operation::Delete, &roles, &claims(), &ops_member).authorized);
    }

    #[test]
    fn list_owner_field_requires_membership() {
        let roles = pools(&[AuthRole::owner(Provider::UserPools, "sub", "owners").list_entity()]);
        let ctx = |owners: Value| {
            RequestContext::builder()
                .claim("sub", "u1")
                .source(record(&json!({ "owners": owners })))
                .build()
        };

        assert!(evaluate(Operation::Update, &roles, &claims(), &ctx(json!(["u0", "u1"]))).authorized);
        assert!(evaluate(Operation::Update, &roles, &claims(), &ctx(json!(["u0"]))).fatal);
    }

    #[test]
    fn missing_source_is_fatal() {
        let roles = pools(&[AuthRole::owner(Provider::UserPools, "sub", "owner")]);
        let ctx = RequestContext::builder().claim("sub", "u1").build();
        assert!(evaluate(Operation::Delete, &roles, &claims(), &ctx).fatal);
    }
}
