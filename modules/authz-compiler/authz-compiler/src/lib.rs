//! Authorization Compiler Module
//!
//! Compiles already-parsed authorization rules into one decision procedure
//! per (type, operation, field) and runs it per request. A decision either
//! authorizes, authorizes subject to a filter or an argument rewrite,
//! redacts a field, or rejects the request.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::{CompilerConfig, KeyClaimSelection};
pub use domain::{AuthzCompilerLocalClient, DecisionProcedure, DomainError, Service};
