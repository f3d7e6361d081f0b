//! Policy Enforcement Point (`PEP`) object.
//!
//! [`DecisionEnforcer`] turns an [`AuthorizationOutcome`] into the one action
//! a request runtime has to take: run unrestricted (after patching
//! arguments), run under a filter, null the field, or abort.

use std::sync::Arc;

use authz_security::{FilterExpr, RequestContext};
use serde_json::{Map, Value};

use crate::api::AuthzCompilerClient;
use crate::error::AuthzCompilerError;
use crate::models::{AuthorizationOutcome, DecisionTarget, FilterShape};

/// Error from the PEP enforcement flow.
#[derive(Debug, thiserror::Error)]
pub enum EnforcerError {
    /// The decision procedure rejected the request.
    #[error("access denied for {target}")]
    Denied { target: String },

    /// The compiler could not produce a decision.
    #[error("authorization evaluation failed: {0}")]
    EvaluationFailed(#[from] AuthzCompilerError),
}

/// What the runtime must apply for a permitted request.
#[derive(Debug, Clone, PartialEq)]
pub enum Enforcement {
    /// Proceed; rewrite the listed arguments first.
    Unrestricted {
        argument_patch: Option<Map<String, Value>>,
    },
    /// Proceed; the store must apply `filter` to the read.
    Filtered {
        filter: FilterExpr,
        shape: Option<FilterShape>,
    },
    /// Deliver the field as null.
    Redacted,
}

impl Enforcement {
    /// Interpret a decision. `None` means the request must be rejected.
    #[must_use]
    pub fn from_outcome(outcome: AuthorizationOutcome) -> Option<Self> {
        if outcome.fatal {
            return None;
        }
        if outcome.authorized {
            return Some(Self::Unrestricted {
                argument_patch: outcome.argument_patch,
            });
        }
        if let Some(filter) = outcome.filter {
            return Some(Self::Filtered {
                filter,
                shape: outcome.filter_shape,
            });
        }
        if outcome.redact {
            return Some(Self::Redacted);
        }
        None
    }
}

/// Policy Enforcement Point.
///
/// Holds the compiler client. Constructed once during runtime init;
/// cloneable and cheap to pass around (`Arc` inside).
///
/// # Example
///
/// ```ignore
/// let enforcer = DecisionEnforcer::new(client.clone());
///
/// match enforcer.enforce(&DecisionTarget::new("Blog", Operation::List), &mut ctx).await? {
///     Enforcement::Filtered { filter, .. } => store.scan_filtered(&filter),
///     Enforcement::Unrestricted { .. } => store.scan(),
///     Enforcement::Redacted => unreachable!("model-level reads never redact"),
/// }
/// ```
#[derive(Clone)]
pub struct DecisionEnforcer {
    client: Arc<dyn AuthzCompilerClient>,
}

impl DecisionEnforcer {
    pub fn new(client: Arc<dyn AuthzCompilerClient>) -> Self {
        Self { client }
    }

    /// Authorize the request and interpret the outcome.
    ///
    /// # Errors
    ///
    /// - [`EnforcerError::Denied`] if the decision is fatal
    /// - [`EnforcerError::EvaluationFailed`] if the compiler call fails
    pub async fn enforce(
        &self,
        target: &DecisionTarget,
        ctx: &mut RequestContext,
    ) -> Result<Enforcement, EnforcerError> {
        let outcome = self.client.authorize(target, ctx).await?;
        Enforcement::from_outcome(outcome).ok_or_else(|| EnforcerError::Denied {
            target: format!("{} {}", target.type_name, target.operation),
        })
    }
}

impl std::fmt::Debug for DecisionEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEnforcer").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::rules::Operation;

    /// Mock that answers every request with a fixed outcome.
    struct FixedMock(AuthorizationOutcome);

    #[async_trait]
    impl AuthzCompilerClient for FixedMock {
        async fn prepare(&self, _target: &DecisionTarget) -> Result<(), AuthzCompilerError> {
            Ok(())
        }

        async fn authorize(
            &self,
            _target: &DecisionTarget,
            _ctx: &mut RequestContext,
        ) -> Result<AuthorizationOutcome, AuthzCompilerError> {
            Ok(self.0.clone())
        }
    }

    /// Mock that always fails.
    struct FailMock;

    #[async_trait]
    impl AuthzCompilerClient for FailMock {
        async fn prepare(&self, _target: &DecisionTarget) -> Result<(), AuthzCompilerError> {
            Err(AuthzCompilerError::Internal("boom".to_owned()))
        }

        async fn authorize(
            &self,
            _target: &DecisionTarget,
            _ctx: &mut RequestContext,
        ) -> Result<AuthorizationOutcome, AuthzCompilerError> {
            Err(AuthzCompilerError::Internal("boom".to_owned()))
        }
    }

    fn enforcer(mock: impl AuthzCompilerClient + 'static) -> DecisionEnforcer {
        DecisionEnforcer::new(Arc::new(mock))
    }

    fn target() -> DecisionTarget {
        DecisionTarget::new("Blog", Operation::List)
    }

    #[tokio::test]
    async fn allow_is_unrestricted() {
        let mut ctx = RequestContext::default();
        let result = enforcer(FixedMock(AuthorizationOutcome::allow()))
            .enforce(&target(), &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            result,
            Enforcement::Unrestricted {
                argument_patch: None
            }
        );
    }

    #[tokio::test]
    async fn patch_is_passed_through() {
        let mut patch = Map::new();
        patch.insert("owner".to_owned(), json!("u1"));
        let mut ctx = RequestContext::default();

        let result = enforcer(FixedMock(AuthorizationOutcome::allow_with_patch(patch.clone())))
            .enforce(&target(), &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            result,
            Enforcement::Unrestricted {
                argument_patch: Some(patch)
            }
        );
    }

    #[tokio::test]
    async fn filter_is_enforced() {
        let filter = FilterExpr::eq("owner", "u1");
        let mut ctx = RequestContext::default();
        let result = enforcer(FixedMock(AuthorizationOutcome::filtered(filter.clone())))
            .enforce(&target(), &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            result,
            Enforcement::Filtered {
                filter,
                shape: None
            }
        );
    }

    #[tokio::test]
    async fn redact_is_enforced() {
        let mut ctx = RequestContext::default();
        let result = enforcer(FixedMock(AuthorizationOutcome::redacted()))
            .enforce(&target(), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result, Enforcement::Redacted);
    }

    #[tokio::test]
    async fn fatal_is_denied() {
        let mut ctx = RequestContext::default();
        let result = enforcer(FixedMock(AuthorizationOutcome::deny()))
            .enforce(&target(), &mut ctx)
            .await;
        assert!(matches!(result, Err(EnforcerError::Denied { target }) if target == "Blog list"));
    }

    #[tokio::test]
    async fn client_error_is_evaluation_failure() {
        let mut ctx = RequestContext::default();
        let result = enforcer(FailMock).enforce(&target(), &mut ctx).await;
        assert!(matches!(
            result,
            Err(EnforcerError::EvaluationFailed(AuthzCompilerError::Internal(_)))
        ));
    }

    #[test]
    fn empty_outcome_is_rejected() {
        assert!(Enforcement::from_outcome(AuthorizationOutcome::default()).is_none());
    }
}
