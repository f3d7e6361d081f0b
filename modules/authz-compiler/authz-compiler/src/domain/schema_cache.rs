//! Process-wide key-schema cache.

use std::sync::Arc;

use authz_compiler_sdk::{AuthzCompilerError, KeySchema, KeySchemaProvider};
use dashmap::DashMap;
use tracing::debug;

/// Caches the schemas of an inner provider until they are invalidated.
pub struct CachedKeySchemaProvider {
    inner: Arc<dyn KeySchemaProvider>,
    cache: DashMap<String, KeySchema>,
}

impl CachedKeySchemaProvider {
    #[must_use]
    pub fn new(inner: Arc<dyn KeySchemaProvider>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Forget the cached schema of `type_name`.
    pub fn invalidate(&self, type_name: &str) {
        if self.cache.remove(type_name).is_some() {
            debug!(type_name, "key schema evicted");
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl KeySchemaProvider for CachedKeySchemaProvider {
    fn key_schema(&self, type_name: &str) -> Result<KeySchema, AuthzCompilerError> {
        if let Some(hit) = self.cache.get(type_name) {
            return Ok(hit.value().clone());
        }
        let schema = self.inner.key_schema(type_name)?;
        self.cache.insert(type_name.to_owned(), schema.clone());
        Ok(schema)
    }
}

impl std::fmt::Debug for CachedKeySchemaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedKeySchemaProvider")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts lookups that reach the storage side.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl KeySchemaProvider for CountingProvider {
        fn key_schema(&self, type_name: &str) -> Result<KeySchema, AuthzCompilerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if type_name == "Blog" {
                Ok(KeySchema::new("id", &[]))
            } else {
                Err(AuthzCompilerError::SchemaLookupFailure {
                    type_name: type_name.to_owned(),
                    reason: "unknown".to_owned(),
                })
            }
        }
    }

    #[test]
    fn caches_until_invalidated() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedKeySchemaProvider::new(inner.clone());

        cached.key_schema("Blog").unwrap();
        cached.key_schema("Blog").unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);

        cached.invalidate("Blog");
        cached.key_schema("Blog").unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        cached.clear();
        assert!(cached.is_empty());
    }

    #[test]
    fn failures_are_not_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedKeySchemaProvider::new(inner.clone());

        assert!(cached.key_schema("Post").is_err());
        assert!(cached.key_schema("Post").is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
