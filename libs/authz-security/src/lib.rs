#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Security vocabulary shared by the authorization compiler and its callers.
//!
//! - [`FilterExpr`] - predicate tree the store applies to partially authorized reads
//! - [`RequestContext`] - identity, arguments and records of one request, plus [`Scratch`]
//! - [`constants`] - claim names and runtime auth-type labels

pub mod constants;
pub mod context;
pub mod filter;

pub use context::{AuthType, ParentOperation, Record, RequestContext, RequestContextBuilder, Scratch};
pub use filter::{
    CompareFilter, CompareOp, FieldFilter, FilterExpr, FilterInputError, SetFilter, filter_keys,
};
