//! Public API trait for the authorization compiler.

use async_trait::async_trait;
use authz_security::RequestContext;

use crate::error::AuthzCompilerError;
use crate::models::{AuthorizationOutcome, DecisionTarget};

/// Public API trait for the authorization compiler.
///
/// Consumed by request runtimes acting as PEPs:
///
/// ```ignore
/// let authz: Arc<dyn AuthzCompilerClient> = Arc::new(LocalClient::new(service));
///
/// let target = DecisionTarget::new("Blog", Operation::Update);
/// let outcome = authz.authorize(&target, &mut ctx).await?;
/// ```
#[async_trait]
pub trait AuthzCompilerClient: Send + Sync {
    /// Compile (or fetch the cached) decision procedure for `target`.
    ///
    /// Lets runtimes surface configuration errors at startup instead of on
    /// the first request.
    ///
    /// # Errors
    ///
    /// - `RulesNotFound` if no rules are registered for the target
    /// - `SchemaLookupFailure` if the key schema is unavailable
    /// - `InvalidTarget` if the target lacks an index, relation or field it needs
    async fn prepare(&self, target: &DecisionTarget) -> Result<(), AuthzCompilerError>;

    /// Decide one request.
    ///
    /// `ctx.scratch` is updated in place so later stages of the same request
    /// (field reads, subscription delivery) observe earlier decisions.
    ///
    /// # Errors
    ///
    /// Same as [`AuthzCompilerClient::prepare`]. A denial is returned as an
    /// outcome with `fatal` set, never as an error.
    async fn authorize(
        &self,
        target: &DecisionTarget,
        ctx: &mut RequestContext,
    ) -> Result<AuthorizationOutcome, AuthzCompilerError>;
}
