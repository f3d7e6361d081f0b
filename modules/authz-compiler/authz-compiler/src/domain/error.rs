//! Domain errors for the authorization compiler.

use authz_compiler_sdk::{AuthzCompilerError, Operation};

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("no rules registered for '{type_name}' {operation}")]
    RulesNotFound {
        type_name: String,
        operation: Operation,
    },

    #[error("key schema unavailable for '{type_name}': {reason}")]
    SchemaUnavailable { type_name: String, reason: String },

    #[error("index '{index}' is not defined on '{type_name}'")]
    UnknownIndex { type_name: String, index: String },

    #[error("invalid decision target: {0}")]
    InvalidTarget(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthzCompilerError> for DomainError {
    fn from(e: AuthzCompilerError) -> Self {
        match e {
            AuthzCompilerError::SchemaLookupFailure { type_name, reason } => {
                Self::SchemaUnavailable { type_name, reason }
            }
            AuthzCompilerError::RulesNotFound {
                type_name,
                operation,
            } => Self::RulesNotFound {
                type_name,
                operation,
            },
            AuthzCompilerError::InvalidTarget(msg) => Self::InvalidTarget(msg),
            AuthzCompilerError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<DomainError> for AuthzCompilerError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::RulesNotFound {
                type_name,
                operation,
            } => Self::RulesNotFound {
                type_name,
                operation,
            },
            DomainError::SchemaUnavailable { type_name, reason } => {
                Self::SchemaLookupFailure { type_name, reason }
            }
            DomainError::UnknownIndex { type_name, index } => Self::SchemaLookupFailure {
                type_name,
                reason: format!("index '{index}' is not defined"),
            },
            DomainError::InvalidTarget(msg) => Self::InvalidTarget(msg),
            DomainError::Internal(msg) => Self::Internal(msg),
        }
    }
}
