//! Static role evaluation and IAM bypasses.

use authz_compiler_sdk::{AuthRole, ProviderConfig, Strategy};
use authz_security::constants::identity_pool_auth;
use authz_security::{AuthType, RequestContext};

use super::claims::ClaimResolver;
use super::roles::ClassifiedRoles;

/// IAM principal assuming one of the configured admin roles.
#[must_use]
pub fn admin_bypass(providers: &ProviderConfig, ctx: &RequestContext) -> bool {
    if !providers.admin_roles_enabled || ctx.auth_type() != Some(AuthType::Iam) {
        return false;
    }
    ctx.user_arn().is_some_and(|arn| {
        providers
            .admin_roles
            .iter()
            .any(|role| arn.contains(&format!("assumed-role/{role}/")))
    })
}

/// IAM principal outside any identity pool, with generic IAM access enabled.
#[must_use]
pub fn generic_iam_bypass(providers: &ProviderConfig, ctx: &RequestContext) -> bool {
    providers.generic_iam_access_enabled
        && ctx.auth_type() == Some(AuthType::Iam)
        && ctx.identity_pool_id().is_none()
}

/// Decide the static roles of one branch. Stops at the first authorizing role.
#[must_use]
pub fn evaluate(
    auth_type: AuthType,
    roles: &ClassifiedRoles,
    providers: &ProviderConfig,
    claims: &ClaimResolver,
    ctx: &RequestContext,
) -> bool {
    if roles.has_private {
        let private_ok = auth_type != AuthType::Iam
            || iam_credentials_match(
                providers,
                ctx,
                providers.auth_role_arn.as_deref(),
                identity_pool_auth::AUTHENTICATED,
            );
        if private_ok {
            return true;
        }
    }

    roles.static_roles.iter().any(|role| match role.strategy {
        Strategy::Public => match auth_type {
            AuthType::ApiKey => true,
            AuthType::Iam => iam_credentials_match(
                providers,
                ctx,
                providers.unauth_role_arn.as_deref(),
                identity_pool_auth::UNAUTHENTICATED,
            ),
            AuthType::Lambda | AuthType::UserPools | AuthType::Oidc => false,
        },
        Strategy::Custom => auth_type == AuthType::Lambda,
        Strategy::Groups => static_group_matches(role, claims, ctx),
        Strategy::Owner | Strategy::Private => false,
    })
}

/// IAM role check for `private` (authenticated) and `public` (unauthenticated)
/// rules. Without a configured role ARN or identity pool any IAM principal
/// passes.
fn iam_credentials_match(
    providers: &ProviderConfig,
    ctx: &RequestContext,
    role_arn: Option<&str>,
    pool_auth_type: &str,
) -> bool {
    if role_arn.is_none() && !providers.has_identity_pool_id {
        return true;
    }
    let arn_match = role_arn.is_some_and(|arn| ctx.user_arn() == Some(arn));
    let pool_match = providers.has_identity_pool_id
        && providers.identity_pool_id.is_some()
        && ctx.identity_pool_id() == providers.identity_pool_id.as_deref()
        && ctx.identity_pool_auth_type() == Some(pool_auth_type);
    arn_match || pool_match
}

fn static_group_matches(role: &AuthRole, claims: &ClaimResolver, ctx: &RequestContext) -> bool {
    let Some(group) = role.entity.as_deref() else {
        return false;
    };
    claims
        .group_claim(role, ctx)
        .is_some_and(|groups| groups.iter().any(|g| g.as_str() == Some(group)))
}
