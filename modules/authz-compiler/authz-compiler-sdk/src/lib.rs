#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authorization Compiler SDK
//!
//! This crate provides the public API for the `authz_compiler` module:
//!
//! - [`AuthzCompilerClient`] - Public API trait for request runtimes
//! - [`AuthRole`], [`RuleCatalog`] - Already-parsed authorization rules
//! - [`ProviderConfig`], [`KeySchema`] - Per-API inputs of the compiler
//! - [`DecisionTarget`], [`AuthorizationOutcome`] - Decision models
//! - [`KeySchemaProvider`] - Key-schema source implemented by the storage side
//! - [`AuthzCompilerError`] - Error types
//! - [`pep`] - PEP helpers ([`DecisionEnforcer`])
//!
//! ## Usage
//!
//! ```ignore
//! use authz_compiler_sdk::{AuthzCompilerClient, DecisionTarget, Operation, pep::DecisionEnforcer};
//!
//! let enforcer = DecisionEnforcer::new(client);
//! let enforcement = enforcer
//!     .enforce(&DecisionTarget::new("Blog", Operation::Update), &mut ctx)
//!     .await?;
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod pep;
pub mod rules;
pub mod schema_api;

// Re-export main types at crate root
pub use api::AuthzCompilerClient;
pub use error::AuthzCompilerError;
pub use models::{
    AuthorizationOutcome, DecisionTarget, FilterShape, IndexKeySchema, JoinSide, JoinTarget,
    KeySchema, ProviderConfig, RelationSpec,
};
pub use pep::{DecisionEnforcer, Enforcement, EnforcerError};
pub use rules::{AuthRole, Operation, Provider, RuleCatalog, RuleEntry, RuleKey, Strategy};
pub use schema_api::{KeySchemaProvider, StaticKeySchemas};
