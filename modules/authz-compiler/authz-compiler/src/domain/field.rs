//! Field-read decisions on the dynamic roles of a protected field.

use authz_compiler_sdk::Operation;
use authz_security::RequestContext;

use super::claims::ClaimResolver;
use super::predicates::{match_groups, match_owner};
use super::roles::{ClassifiedRoles, passes_gate};

/// `true` if an owner or group role matches the record the field is read from.
#[must_use]
pub fn evaluate(roles: &ClassifiedRoles, claims: &ClaimResolver, ctx: &RequestContext) -> bool {
    let Some(source) = ctx.source() else {
        return false;
    };
    let caller_groups = claims.caller_groups(ctx);

    roles
        .owner_roles
        .iter()
        .filter(|role| passes_gate(role, Operation::FieldRead, &caller_groups))
        .any(|role| match_owner(role, claims, ctx, source, false).is_some())
        || roles
            .group_roles
            .iter()
            .any(|role| match_groups(role, claims, ctx, source, false).is_some())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::domain::roles::RoleSet;
    use authz_compiler_sdk::{AuthRole, Provider};
    use authz_security::AuthType;
    use serde_json::json;

    fn claims() -> ClaimResolver {
        ClaimResolver::from_config(&CompilerConfig::default())
    }

    #[test]
    fn owner_of_source_may_read() {
        let roles = RoleSet::classify(&[AuthRole::owner(Provider::UserPools, "sub", "owner")], None)
            .branch(AuthType::UserPools)
            .cloned()
            .unwrap();
        let source = json!({ "owner": "u1" }).as_object().cloned().unwrap();

        let owner = RequestContext::builder()
            .claim("sub", "u1")
            .source(source.clone())
            .build();
        let stranger = RequestContext::builder()
            .claim("sub", "u2")
            .source(source)
            .build();
        let no_source = RequestContext::builder().claim("sub", "u1").build();

        assert!(evaluate(&roles, &claims(), &owner));
        assert!(!evaluate(&roles, &claims(), &stranger));
        assert!(!evaluate(&roles, &claims(), &no_source));
    }

    #[test]
    fn group_member_may_read() {
        let roles = RoleSet::classify(
            &[AuthRole::groups(Provider::UserPools, "cognito:groups", "team")],
            None,
        )
        .branch(AuthType::UserPools)
        .cloned()
        .unwrap();
        let ctx = RequestContext::builder()
            .claim("cognito:groups", json!(["eng"]))
            .source(json!({ "team": "eng" }).as_object().cloned().unwrap())
            .build();
        assert!(evaluate(&roles, &claims(), &ctx));
    }
}
