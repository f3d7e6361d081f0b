use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::auth_type_labels;
use crate::filter::FilterExpr;

/// A record as seen by the authorization core: field name to JSON value.
pub type Record = Map<String, Value>;

/// The authentication mode the runtime used for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    ApiKey,
    Lambda,
    Iam,
    UserPools,
    Oidc,
}

impl AuthType {
    /// Map the runtime's auth-type label (e.g. `"User Pool Authorization"`).
    #[must_use]
    pub fn from_runtime_label(label: &str) -> Option<Self> {
        match label {
            auth_type_labels::API_KEY => Some(Self::ApiKey),
            auth_type_labels::LAMBDA => Some(Self::Lambda),
            auth_type_labels::IAM => Some(Self::Iam),
            auth_type_labels::USER_POOLS => Some(Self::UserPools),
            auth_type_labels::OIDC => Some(Self::Oidc),
            _ => None,
        }
    }

    #[must_use]
    pub fn runtime_label(self) -> &'static str {
        match self {
            Self::ApiKey => auth_type_labels::API_KEY,
            Self::Lambda => auth_type_labels::LAMBDA,
            Self::Iam => auth_type_labels::IAM,
            Self::UserPools => auth_type_labels::USER_POOLS,
            Self::Oidc => auth_type_labels::OIDC,
        }
    }
}

/// Which top-level operation produced the record a field read is resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParentOperation {
    Query,
    Mutation,
    Subscription,
}

/// Per-request state shared between evaluation stages.
///
/// Created empty with the [`RequestContext`] and dropped with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scratch {
    /// Set by any model-level decision that had rules to evaluate.
    pub has_auth: bool,
    /// Set on the write path when a protected field was withheld from the
    /// mutation caller; subscription delivery then nulls the same field.
    pub denied_field: bool,
    /// The authorization filter computed for the current query, if any.
    pub auth_filter: Option<FilterExpr>,
}

/// Everything the decision procedure may read about one request.
///
/// Built by the request runtime; `scratch` is the only part the core writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    auth_type: Option<AuthType>,
    identity_claims: Map<String, Value>,
    user_arn: Option<String>,
    identity_pool_id: Option<String>,
    identity_pool_auth_type: Option<String>,
    arguments: Map<String, Value>,
    source: Option<Record>,
    result: Option<Record>,
    parent_operation: Option<ParentOperation>,
    scratch: Scratch,
}

impl RequestContext {
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    #[must_use]
    pub fn auth_type(&self) -> Option<AuthType> {
        self.auth_type
    }

    /// Raw claim lookup. Multi-segment paths are resolved by the claim resolver.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.identity_claims.get(name).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn identity_claims(&self) -> &Map<String, Value> {
        &self.identity_claims
    }

    #[must_use]
    pub fn user_arn(&self) -> Option<&str> {
        self.user_arn.as_deref()
    }

    #[must_use]
    pub fn identity_pool_id(&self) -> Option<&str> {
        self.identity_pool_id.as_deref()
    }

    #[must_use]
    pub fn identity_pool_auth_type(&self) -> Option<&str> {
        self.identity_pool_auth_type.as_deref()
    }

    #[must_use]
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    /// A request argument; explicit `null` counts as not supplied.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn source(&self) -> Option<&Record> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&Record> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn parent_operation(&self) -> Option<ParentOperation> {
        self.parent_operation
    }

    #[must_use]
    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }
}

#[derive(Default)]
pub struct RequestContextBuilder {
    auth_type: Option<AuthType>,
    identity_claims: Map<String, Value>,
    user_arn: Option<String>,
    identity_pool_id: Option<String>,
    identity_pool_auth_type: Option<String>,
    arguments: Map<String, Value>,
    source: Option<Record>,
    result: Option<Record>,
    parent_operation: Option<ParentOperation>,
    scratch: Scratch,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = Some(auth_type);
        self
    }

    #[must_use]
    pub fn claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.identity_claims.insert(name.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn identity_claims(mut self, claims: Map<String, Value>) -> Self {
        self.identity_claims = claims;
        self
    }

    #[must_use]
    pub fn user_arn(mut self, arn: &str) -> Self {
        self.user_arn = Some(arn.to_owned());
        self
    }

    #[must_use]
    pub fn identity_pool(mut self, pool_id: &str, auth_type: &str) -> Self {
        self.identity_pool_id = Some(pool_id.to_owned());
        self.identity_pool_auth_type = Some(auth_type.to_owned());
        self
    }

    #[must_use]
    pub fn argument(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    #[must_use]
    pub fn source(mut self, source: Record) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn result(mut self, result: Record) -> Self {
        self.result = Some(result);
        self
    }

    #[must_use]
    pub fn parent_operation(mut self, op: ParentOperation) -> Self {
        self.parent_operation = Some(op);
        self
    }

    #[must_use]
    pub fn scratch(mut self, scratch: Scratch) -> Self {
        self.scratch = scratch;
        self
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            auth_type: self.auth_type,
            identity_claims: self.identity_claims,
            user_arn: self.user_arn,
            identity_pool_id: self.identity_pool_id,
            identity_pool_auth_type: self.identity_pool_auth_type,
            arguments: self.arguments,
            source: self.source,
            result: self.result,
            parent_operation: self.parent_operation,
            scratch: self.scratch,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_full() {
        let ctx = RequestContext::builder()
            .auth_type(AuthType::UserPools)
            .claim("sub", "u1")
            .claim("cognito:groups", json!(["admin"]))
            .argument("owner", "u1")
            .source(json!({ "owner": "u1" }).as_object().cloned().unwrap())
            .parent_operation(ParentOperation::Mutation)
            .build();

        assert_eq!(ctx.auth_type(), Some(AuthType::UserPools));
        assert_eq!(ctx.claim("sub"), Some(&json!("u1")));
        assert_eq!(ctx.argument("owner"), Some(&json!("u1")));
        assert_eq!(ctx.source().and_then(|s| s.get("owner")), Some(&json!("u1")));
        assert_eq!(ctx.parent_operation(), Some(ParentOperation::Mutation));
        assert_eq!(ctx.scratch(), &Scratch::default());
    }

    #[test]
    fn null_claims_and_arguments_read_as_absent() {
        let ctx = RequestContext::builder()
            .claim("username", Value::Null)
            .argument("owner", Value::Null)
            .build();

        assert!(ctx.claim("username").is_none());
        assert!(ctx.argument("owner").is_none());
        assert!(ctx.arguments().contains_key("owner"));
    }

    #[test]
    fn scratch_is_writable() {
        let mut ctx = RequestContext::builder().build();
        ctx.scratch_mut().has_auth = true;
        assert!(ctx.scratch().has_auth);
    }

    #[test]
    fn runtime_labels_round_trip() {
        for auth_type in [
            AuthType::ApiKey,
            AuthType::Lambda,
            AuthType::Iam,
            AuthType::UserPools,
            AuthType::Oidc,
        ] {
            assert_eq!(
                AuthType::from_runtime_label(auth_type.runtime_label()),
                Some(auth_type)
            );
        }
        assert_eq!(AuthType::from_runtime_label("Basic"), None);
    }

    #[test]
    fn deserializes_runtime_payload() {
        let ctx: RequestContext = serde_json::from_value(json!({
            "authType": "oidc",
            "identityClaims": { "sub": "u1" },
            "arguments": { "id": "p1" },
            "source": { "owner": "u1" }
        }))
        .unwrap();

        assert_eq!(ctx.auth_type(), Some(AuthType::Oidc));
        assert_eq!(ctx.claim("sub"), Some(&json!("u1")));
        assert!(ctx.result().is_none());
        assert!(!ctx.scratch().has_auth);
    }
}
