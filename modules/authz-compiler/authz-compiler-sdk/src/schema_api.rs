//! Key-schema lookup consumed from the storage engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AuthzCompilerError;
use crate::models::KeySchema;

/// Source of key schemas for the types an API exposes.
///
/// Lookups are synchronous: schemas are read-only for the lifetime of a
/// decision and implementations are expected to answer from memory.
pub trait KeySchemaProvider: Send + Sync {
    /// Key schema of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLookupFailure` if the type is unknown to the provider.
    fn key_schema(&self, type_name: &str) -> Result<KeySchema, AuthzCompilerError>;
}

/// In-memory key schemas, keyed by type name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticKeySchemas {
    schemas: HashMap<String, KeySchema>,
}

impl StaticKeySchemas {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, type_name: &str, schema: KeySchema) -> Self {
        self.schemas.insert(type_name.to_owned(), schema);
        self
    }
}

impl KeySchemaProvider for StaticKeySchemas {
    fn key_schema(&self, type_name: &str) -> Result<KeySchema, AuthzCompilerError> {
        self.schemas
            .get(type_name)
            .cloned()
            .ok_or_else(|| AuthzCompilerError::SchemaLookupFailure {
                type_name: type_name.to_owned(),
                reason: "type is not registered".to_owned(),
            })
    }
}
