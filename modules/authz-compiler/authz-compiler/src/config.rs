//! Configuration for the authorization compiler.

use std::path::Path;

use anyhow::Context;
use authz_compiler_sdk::ProviderConfig;
use authz_security::constants::{CLAIM_DELIMITER, claims};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment prefix; nested keys are split on `__`
/// (`AUTHZ_COMPILER_PROVIDERS__USER_POOLS=true`).
pub const ENV_PREFIX: &str = "AUTHZ_COMPILER_";

/// Which value of a multi-segment claim goes into a sort-key condition.
///
/// Partition-key conditions always receive the joined value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyClaimSelection {
    /// The last resolved segment (`"sub::username"` pushes the username).
    #[default]
    Last,
    /// The delimiter-joined value.
    Joined,
}

/// Configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Enabled identity providers and IAM switches.
    pub providers: ProviderConfig,
    /// Allow API-key callers on fields of types that carry no rules.
    pub sandbox_mode: bool,
    pub claim_delimiter: String,
    /// Claim read by group roles that do not name one.
    pub default_groups_claim: String,
    /// Claim read by owner roles that do not name one.
    pub default_owner_claim: String,
    pub key_claim_selection: KeyClaimSelection,
    /// Cache key schemas process-wide.
    pub schema_cache: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            providers: ProviderConfig::default(),
            sandbox_mode: false,
            claim_delimiter: CLAIM_DELIMITER.to_owned(),
            default_groups_claim: claims::COGNITO_GROUPS.to_owned(),
            default_owner_claim: format!("{}{CLAIM_DELIMITER}{}", claims::SUB, claims::USERNAME),
            key_claim_selection: KeyClaimSelection::default(),
            schema_cache: true,
        }
    }
}

impl CompilerConfig {
    /// Load defaults, then the optional YAML file, then `AUTHZ_COMPILER_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, a value has the wrong
    /// type, or an unknown key is present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid authz compiler configuration")?;

        anyhow::ensure!(
            !config.claim_delimiter.is_empty(),
            "claim_delimiter must not be empty"
        );
        Ok(config)
    }
}
