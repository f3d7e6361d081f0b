//! PEP (Policy Enforcement Point) helpers.
//!
//! - [`DecisionEnforcer`] - PEP object (authorize -> interpret outcome)
//! - [`Enforcement`] - what the runtime must do before touching the store

pub mod enforcer;

pub use enforcer::{DecisionEnforcer, Enforcement, EnforcerError};
