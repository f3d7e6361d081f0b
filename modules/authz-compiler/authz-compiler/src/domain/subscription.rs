//! Subscription decisions.
//!
//! Subscriptions always run under a runtime filter built from the owner and
//! group roles. A caller-supplied owner argument is checked up front: nobody
//! may listen for another identity's events.

use authz_compiler_sdk::{AuthorizationOutcome, FilterShape, Operation};
use authz_security::{FilterExpr, RequestContext};
use tracing::{debug, warn};

use super::claims::ClaimResolver;
use super::predicates::{group_clauses, owner_clauses, push_unique};
use super::roles::{ClassifiedRoles, passes_gate};

/// Argument holding the subscriber's own filter.
pub const FILTER_ARGUMENT: &str = "filter";

/// Decide a subscription with the dynamic roles of the caller's branch.
#[must_use]
pub fn evaluate(
    roles: &ClassifiedRoles,
    claims: &ClaimResolver,
    ctx: &RequestContext,
) -> AuthorizationOutcome {
    let caller_groups = claims.caller_groups(ctx);
    let mut clauses = Vec::new();

    for role in &roles.owner_roles {
        if !passes_gate(role, Operation::Subscribe, &caller_groups) {
            continue;
        }
        let Some(claim) = claims.owner_claim(role, ctx) else {
            continue;
        };
        let supplied = role.entity.as_deref().and_then(|entity| ctx.argument(entity));
        if let Some(value) = supplied {
            if claim.matches(value) {
                return AuthorizationOutcome::allow();
            }
            debug!(
                provider = ?ctx.auth_type(),
                operation = %Operation::Subscribe,
                reason = "owner argument names another identity",
                "subscription denied"
            );
            return AuthorizationOutcome::deny();
        }
        push_unique(&mut clauses, owner_clauses(role, &claim));
    }

    for role in &roles.group_roles {
        if let Some(groups) = claims.group_claim(role, ctx) {
            push_unique(&mut clauses, group_clauses(role, &groups));
        }
    }

    let Some(auth_filter) = FilterExpr::or_all(clauses) else {
        debug!(
            provider = ?ctx.auth_type(),
            operation = %Operation::Subscribe,
            reason = "no role produced a filter",
            "subscription denied"
        );
        return AuthorizationOutcome::deny();
    };

    let caller_filter = match ctx
        .arguments()
        .get(FILTER_ARGUMENT)
        .map(FilterExpr::from_input)
        .transpose()
    {
        Ok(parsed) => parsed.flatten(),
        Err(e) => {
            warn!(error = %e, "rejecting subscription with malformed filter");
            return AuthorizationOutcome::deny();
        }
    };

    match caller_filter {
        None if auth_filter.clause_count() == 1 => {
            AuthorizationOutcome::filtered_subscription(auth_filter, FilterShape::Basic)
        }
        None => AuthorizationOutcome::filtered_subscription(auth_filter, FilterShape::Full),
        Some(caller_filter) => AuthorizationOutcome::filtered_subscription(
            FilterExpr::And(vec![auth_filter, caller_filter]),
            FilterShape::Full,
        ),
    }
}
