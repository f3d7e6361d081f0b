//! Compiled decision procedures and the per-request orchestration.

use std::sync::Arc;

use authz_compiler_sdk::{AuthorizationOutcome, DecisionTarget, Operation, ProviderConfig, Provider};
use authz_security::{AuthType, ParentOperation, RequestContext};
use tracing::{debug, warn};

use super::claims::ClaimResolver;
use super::roles::{ClassifiedRoles, RoleSet};
use super::{field, mutation, query, static_roles, subscription};
use crate::config::{CompilerConfig, KeyClaimSelection};

/// Per-API settings shared by every compiled procedure.
#[derive(Debug, Clone)]
pub struct DecisionSettings {
    pub providers: ProviderConfig,
    pub claims: ClaimResolver,
    pub sandbox_mode: bool,
    pub key_claim_selection: KeyClaimSelection,
}

impl DecisionSettings {
    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            providers: config.providers.clone(),
            claims: ClaimResolver::from_config(config),
            sandbox_mode: config.sandbox_mode,
            key_claim_selection: config.key_claim_selection,
        }
    }

    /// The IAM branch is open when either IAM or identity-pool auth is enabled.
    fn branch_enabled(&self, auth_type: AuthType) -> bool {
        match auth_type {
            AuthType::ApiKey => self.providers.is_enabled(Provider::ApiKey),
            AuthType::Lambda => self.providers.is_enabled(Provider::Lambda),
            AuthType::Iam => {
                self.providers.is_enabled(Provider::Iam)
                    || self.providers.is_enabled(Provider::IdentityPool)
            }
            AuthType::UserPools => self.providers.is_enabled(Provider::UserPools),
            AuthType::Oidc => self.providers.is_enabled(Provider::Oidc),
        }
    }

    /// Fallback for fields of types that carry no rules.
    fn sandbox_allows(&self, ctx: &RequestContext) -> bool {
        match ctx.auth_type() {
            Some(AuthType::ApiKey) => self.sandbox_mode,
            Some(AuthType::Iam) => static_roles::generic_iam_bypass(&self.providers, ctx),
            _ => false,
        }
    }
}

/// Result of entering the caller's provider branch.
enum Branch<'a> {
    Allowed,
    Denied,
    Dynamic(&'a ClassifiedRoles),
}

/// An immutable decision procedure for one [`DecisionTarget`].
///
/// Built once by [`super::Service::compile`]; [`DecisionProcedure::decide`]
/// runs per request and only writes to the request's scratch.
#[derive(Debug)]
pub struct DecisionProcedure {
    target: DecisionTarget,
    roles: RoleSet,
    settings: Arc<DecisionSettings>,
}

impl DecisionProcedure {
    #[must_use]
    pub fn new(target: DecisionTarget, roles: RoleSet, settings: Arc<DecisionSettings>) -> Self {
        Self {
            target,
            roles,
            settings,
        }
    }

    #[must_use]
    pub fn target(&self) -> &DecisionTarget {
        &self.target
    }

    /// Decide one request.
    ///
    /// Model-level procedures with rules mark `scratch.has_auth` and store a
    /// computed filter in `scratch.auth_filter`.
    #[tracing::instrument(
        skip_all,
        fields(type_name = %self.target.type_name, operation = %self.target.operation)
    )]
    pub fn decide(&self, ctx: &mut RequestContext) -> AuthorizationOutcome {
        let operation = self.target.operation;
        if operation == Operation::FieldRead {
            return self.decide_field(ctx);
        }
        if !self.roles.is_empty() {
            ctx.scratch_mut().has_auth = true;
        }

        let outcome = match self.enter_branch(ctx) {
            Branch::Allowed => AuthorizationOutcome::allow(),
            Branch::Denied => AuthorizationOutcome::deny(),
            Branch::Dynamic(roles) => self.decide_dynamic(operation, roles, ctx),
        };

        if let Some(filter) = &outcome.filter {
            ctx.scratch_mut().auth_filter = Some(filter.clone());
        }
        outcome
    }

    fn decide_dynamic(
        &self,
        operation: Operation,
        roles: &ClassifiedRoles,
        ctx: &RequestContext,
    ) -> AuthorizationOutcome {
        let claims = &self.settings.claims;
        if operation.is_mutation() {
            mutation::evaluate(operation, roles, claims, ctx)
        } else if operation.is_keyed_read() {
            query::evaluate(
                operation,
                roles,
                claims,
                self.settings.key_claim_selection,
                ctx,
            )
        } else {
            subscription::evaluate(roles, claims, ctx)
        }
    }

    fn decide_field(&self, ctx: &mut RequestContext) -> AuthorizationOutcome {
        let parent = ctx.parent_operation();
        if parent == Some(ParentOperation::Subscription) && ctx.scratch().denied_field {
            return AuthorizationOutcome::redacted();
        }

        let authorized = match self.enter_branch(ctx) {
            Branch::Allowed => true,
            Branch::Denied => false,
            Branch::Dynamic(roles) => field::evaluate(roles, &self.settings.claims, ctx),
        };
        if authorized || (!ctx.scratch().has_auth && self.settings.sandbox_allows(ctx)) {
            return AuthorizationOutcome::allow();
        }

        if parent == Some(ParentOperation::Mutation) {
            ctx.scratch_mut().denied_field = true;
            return AuthorizationOutcome::redacted();
        }
        debug!(
            provider = ?ctx.auth_type(),
            operation = %Operation::FieldRead,
            reason = "no role grants the field",
            "field read denied"
        );
        AuthorizationOutcome::deny()
    }

    /// Admin bypass, generic IAM bypass, then static roles of the caller's branch.
    fn enter_branch(&self, ctx: &RequestContext) -> Branch<'_> {
        let Some(auth_type) = ctx.auth_type() else {
            warn!("request carries no auth type");
            return Branch::Denied;
        };
        if !self.settings.branch_enabled(auth_type) {
            warn!(provider = ?auth_type, "request uses a disabled provider");
            return Branch::Denied;
        }

        let providers = &self.settings.providers;
        if static_roles::admin_bypass(providers, ctx) {
            debug!("admin role bypass");
            return Branch::Allowed;
        }
        if static_roles::generic_iam_bypass(providers, ctx) {
            return Branch::Allowed;
        }

        let Some(roles) = self.roles.branch(auth_type) else {
            debug!(
                provider = ?auth_type,
                operation = %self.target.operation,
                reason = "no rules for provider",
                "denied"
            );
            return Branch::Denied;
        };
        if static_roles::evaluate(auth_type, roles, providers, &self.settings.claims, ctx) {
            return Branch::Allowed;
        }
        if roles.has_dynamic() {
            Branch::Dynamic(roles)
        } else {
            debug!(
                provider = ?auth_type,
                operation = %self.target.operation,
                reason = "no static role matched",
                "denied"
            );
            Branch::Denied
        }
    }
}
