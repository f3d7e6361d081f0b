//! Claim resolution.
//!
//! A claim path may join several identity sources with the configured
//! delimiter (`"sub::username"`). Resolution yields both the joined value,
//! used when a record is stamped with the caller's identity, and every
//! segment on its own, used when matching records that were stamped with a
//! single segment.

use authz_compiler_sdk::AuthRole;
use authz_security::RequestContext;
use authz_security::constants::claims;
use serde_json::Value;

use crate::config::CompilerConfig;

/// A claim path resolved against one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClaim {
    joined: Value,
    segments: Vec<Value>,
}

impl ResolvedClaim {
    #[must_use]
    pub fn joined(&self) -> &Value {
        &self.joined
    }

    #[must_use]
    pub fn segments(&self) -> &[Value] {
        &self.segments
    }

    #[must_use]
    pub fn last_segment(&self) -> &Value {
        self.segments.last().unwrap_or(&self.joined)
    }

    /// The joined value followed by every distinct segment.
    #[must_use]
    pub fn candidates(&self) -> Vec<&Value> {
        let mut out = vec![&self.joined];
        for segment in &self.segments {
            if !out.contains(&segment) {
                out.push(segment);
            }
        }
        out
    }

    /// `true` if `value` (or, for a list, any element) is the joined value or
    /// one of the segments.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().any(|item| self.matches_scalar(item)),
            other => self.matches_scalar(other),
        }
    }

    fn matches_scalar(&self, value: &Value) -> bool {
        !value.is_null() && (*value == self.joined || self.segments.contains(value))
    }
}

/// Resolves role claims against request identities.
#[derive(Debug, Clone)]
pub struct ClaimResolver {
    delimiter: String,
    default_owner_claim: String,
    default_groups_claim: String,
}

impl ClaimResolver {
    #[must_use]
    pub fn new(delimiter: &str, default_owner_claim: &str, default_groups_claim: &str) -> Self {
        Self {
            delimiter: delimiter.to_owned(),
            default_owner_claim: default_owner_claim.to_owned(),
            default_groups_claim: default_groups_claim.to_owned(),
        }
    }

    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(
            &config.claim_delimiter,
            &config.default_owner_claim,
            &config.default_groups_claim,
        )
    }

    /// Resolve a possibly multi-segment claim path.
    ///
    /// `None` when any segment is missing or null: the claim is invalid for
    /// this request and the role it belongs to cannot match.
    #[must_use]
    pub fn resolve(&self, path: &str, ctx: &RequestContext) -> Option<ResolvedClaim> {
        let segments = path
            .split(self.delimiter.as_str())
            .map(|name| lookup(ctx, name).cloned())
            .collect::<Option<Vec<_>>>()?;

        let joined = match segments.as_slice() {
            [single] => single.clone(),
            many => Value::String(
                many.iter()
                    .map(display_value)
                    .collect::<Vec<_>>()
                    .join(&self.delimiter),
            ),
        };
        Some(ResolvedClaim { joined, segments })
    }

    /// Resolve a group claim into a list of group names.
    #[must_use]
    pub fn groups(&self, path: &str, ctx: &RequestContext) -> Option<Vec<Value>> {
        lookup(ctx, path).map(normalize_group_claim)
    }

    /// Owner claim of `role`, falling back to the configured default path.
    #[must_use]
    pub fn owner_claim(&self, role: &AuthRole, ctx: &RequestContext) -> Option<ResolvedClaim> {
        self.resolve(
            role.claim.as_deref().unwrap_or(&self.default_owner_claim),
            ctx,
        )
    }

    /// Group claim of `role`, falling back to the configured default path.
    #[must_use]
    pub fn group_claim(&self, role: &AuthRole, ctx: &RequestContext) -> Option<Vec<Value>> {
        self.groups(
            role.claim.as_deref().unwrap_or(&self.default_groups_claim),
            ctx,
        )
    }

    /// The caller's groups from the default group claim; empty if absent.
    #[must_use]
    pub fn caller_groups(&self, ctx: &RequestContext) -> Vec<Value> {
        self.groups(&self.default_groups_claim, ctx)
            .unwrap_or_default()
    }
}

/// Group claims arrive as a list, a JSON-encoded list, or a single name.
#[must_use]
pub fn normalize_group_claim(raw: &Value) -> Vec<Value> {
    match raw {
        Value::Array(items) => non_null(items),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => non_null(&items),
            _ => vec![raw.clone()],
        },
        other => vec![other.clone()],
    }
}

fn non_null(items: &[Value]) -> Vec<Value> {
    items.iter().filter(|v| !v.is_null()).cloned().collect()
}

fn lookup<'a>(ctx: &'a RequestContext, name: &str) -> Option<&'a Value> {
    ctx.claim(name).or_else(|| {
        (name == claims::USERNAME)
            .then_some(claims::COGNITO_USERNAME)
            .and_then(|fallback| ctx.claim(fallback))
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
