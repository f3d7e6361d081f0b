//! Well-known names shared by the request runtime and the authorization core.

/// Delimiter joining the segments of a multi-source claim path (`"sub::username"`).
pub const CLAIM_DELIMITER: &str = "::";

/// Identity claim names.
pub mod claims {
    pub const SUB: &str = "sub";
    /// Reserved segment name that falls back to [`COGNITO_USERNAME`].
    pub const USERNAME: &str = "username";
    pub const COGNITO_USERNAME: &str = "cognito:username";
    pub const COGNITO_GROUPS: &str = "cognito:groups";
}

/// Auth-type labels reported by the request runtime.
pub mod auth_type_labels {
    pub const API_KEY: &str = "API Key Authorization";
    pub const LAMBDA: &str = "Lambda Authorization";
    pub const IAM: &str = "IAM Authorization";
    pub const USER_POOLS: &str = "User Pool Authorization";
    pub const OIDC: &str = "Open ID Connect Authorization";
}

/// Values of the identity-pool auth type.
pub mod identity_pool_auth {
    pub const AUTHENTICATED: &str = "authenticated";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
}
