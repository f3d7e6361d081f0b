//! Local (in-process) client for the authorization compiler.

use std::sync::Arc;

use async_trait::async_trait;
use authz_compiler_sdk::{
    AuthorizationOutcome, AuthzCompilerClient, AuthzCompilerError, DecisionTarget,
};
use authz_security::RequestContext;

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct AuthzCompilerLocalClient {
    svc: Arc<Service>,
}

impl AuthzCompilerLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> AuthzCompilerError {
    tracing::error!(operation = op, error = ?e, "authz_compiler call failed");
    e.into()
}

#[async_trait]
impl AuthzCompilerClient for AuthzCompilerLocalClient {
    async fn prepare(&self, target: &DecisionTarget) -> Result<(), AuthzCompilerError> {
        self.svc
            .compile(target)
            .map(|_| ())
            .map_err(|e| log_and_convert("prepare", e))
    }

    async fn authorize(
        &self,
        target: &DecisionTarget,
        ctx: &mut RequestContext,
    ) -> Result<AuthorizationOutcome, AuthzCompilerError> {
        self.svc
            .authorize(target, ctx)
            .map_err(|e| log_and_convert("authorize", e))
    }
}
