//! Error types for the authorization compiler.

use thiserror::Error;

use crate::rules::Operation;

/// Errors that can occur when compiling or running a decision procedure.
///
/// These represent configuration and infrastructure failures only.
/// Access denial is expressed via `AuthorizationOutcome.fatal == true`,
/// not as an error variant.
#[derive(Debug, Error)]
pub enum AuthzCompilerError {
    /// The key schema of a type (or one of its indexes) is unavailable.
    #[error("key schema lookup failed for '{type_name}': {reason}")]
    SchemaLookupFailure { type_name: String, reason: String },

    /// No rule set is registered for the target.
    #[error("no rules registered for '{type_name}' {operation}")]
    RulesNotFound {
        type_name: String,
        operation: Operation,
    },

    /// The target is missing data its operation requires.
    #[error("invalid decision target: {0}")]
    InvalidTarget(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
