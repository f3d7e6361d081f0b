//! Domain layer for the authorization compiler.

pub mod claims;
pub mod error;
pub mod field;
pub mod local_client;
pub mod mutation;
pub mod predicates;
pub mod procedure;
pub mod query;
pub mod roles;
pub mod schema_cache;
pub mod service;
pub mod static_roles;
pub mod subscription;

pub use error::DomainError;
pub use local_client::AuthzCompilerLocalClient;
pub use procedure::{DecisionProcedure, DecisionSettings};
pub use schema_cache::CachedKeySchemaProvider;
pub use service::Service;
