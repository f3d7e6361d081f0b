//! Domain service for the authorization compiler.

use std::sync::Arc;

use authz_compiler_sdk::{
    AuthorizationOutcome, DecisionTarget, KeySchemaProvider, Operation, RuleCatalog,
};
use authz_security::RequestContext;
use dashmap::DashMap;
use tracing::{debug, info};

use super::error::DomainError;
use super::procedure::{DecisionProcedure, DecisionSettings};
use super::roles::{KeyAttributes, RoleSet};
use super::schema_cache::CachedKeySchemaProvider;
use crate::config::CompilerConfig;

/// Authorization compiler service.
///
/// Compiles one [`DecisionProcedure`] per target on first use and keeps it
/// until the type is invalidated.
pub struct Service {
    catalog: RuleCatalog,
    schemas: Arc<dyn KeySchemaProvider>,
    schema_cache: Option<Arc<CachedKeySchemaProvider>>,
    settings: Arc<DecisionSettings>,
    procedures: DashMap<DecisionTarget, Arc<DecisionProcedure>>,
}

impl Service {
    #[must_use]
    pub fn new(
        config: &CompilerConfig,
        catalog: RuleCatalog,
        schemas: Arc<dyn KeySchemaProvider>,
    ) -> Self {
        let (schemas, schema_cache) = if config.schema_cache {
            let cached = Arc::new(CachedKeySchemaProvider::new(schemas));
            (Arc::clone(&cached) as Arc<dyn KeySchemaProvider>, Some(cached))
        } else {
            (schemas, None)
        };
        info!(rule_sets = catalog.len(), "authz compiler ready");
        Self {
            catalog,
            schemas,
            schema_cache,
            settings: Arc::new(DecisionSettings::from_config(config)),
            procedures: DashMap::new(),
        }
    }

    /// Compile (or fetch the cached) decision procedure for `target`.
    ///
    /// # Errors
    ///
    /// - `InvalidTarget` if the operation needs an index, relation or field the target lacks
    /// - `RulesNotFound` if the catalog has no rule set for the target
    /// - `SchemaUnavailable` / `UnknownIndex` if key schema lookup fails for a keyed read
    #[tracing::instrument(
        skip_all,
        fields(type_name = %target.type_name, operation = %target.operation)
    )]
    pub fn compile(&self, target: &DecisionTarget) -> Result<Arc<DecisionProcedure>, DomainError> {
        if let Some(hit) = self.procedures.get(target) {
            return Ok(Arc::clone(hit.value()));
        }
        validate_target(target)?;

        let roles = self
            .catalog
            .get(&target.rule_key())
            .ok_or_else(|| DomainError::RulesNotFound {
                type_name: target.type_name.clone(),
                operation: target.operation,
            })?;
        let keys = if target.operation.is_keyed_read() {
            Some(self.key_attributes(target)?)
        } else {
            None
        };

        let procedure = Arc::new(DecisionProcedure::new(
            target.clone(),
            RoleSet::classify(roles, keys.as_ref()),
            Arc::clone(&self.settings),
        ));
        self.procedures
            .insert(target.clone(), Arc::clone(&procedure));
        debug!(role_count = roles.len(), "compiled decision procedure");
        Ok(procedure)
    }

    /// Decide one request against the procedure for `target`.
    ///
    /// # Errors
    ///
    /// Same as [`Service::compile`].
    pub fn authorize(
        &self,
        target: &DecisionTarget,
        ctx: &mut RequestContext,
    ) -> Result<AuthorizationOutcome, DomainError> {
        Ok(self.compile(target)?.decide(ctx))
    }

    /// Drop compiled procedures and the cached key schema of `type_name`.
    pub fn invalidate(&self, type_name: &str) {
        self.procedures
            .retain(|target, _| target.type_name != type_name);
        if let Some(cache) = &self.schema_cache {
            cache.invalidate(type_name);
        }
        info!(type_name, "decision procedures invalidated");
    }

    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.procedures.len()
    }

    fn key_attributes(&self, target: &DecisionTarget) -> Result<KeyAttributes, DomainError> {
        let schema = self.schemas.key_schema(&target.type_name)?;
        let index = target
            .index
            .as_deref()
            .or_else(|| target.relation.as_ref().and_then(|r| r.index.as_deref()));
        let keys = schema
            .keys_for(index)
            .ok_or_else(|| DomainError::UnknownIndex {
                type_name: target.type_name.clone(),
                index: index.unwrap_or_default().to_owned(),
            })?;
        Ok(KeyAttributes::new(keys, target.relation.as_ref()))
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("rule_sets", &self.catalog.len())
            .field("compiled", &self.procedures.len())
            .finish_non_exhaustive()
    }
}

fn validate_target(target: &DecisionTarget) -> Result<(), DomainError> {
    let missing = match target.operation {
        Operation::Query if target.index.is_none() => Some("an index name"),
        Operation::Relational if target.relation.is_none() => Some("a relation spec"),
        Operation::FieldRead if target.field.is_none() => Some("a field name"),
        _ => None,
    };
    match missing {
        Some(what) => Err(DomainError::InvalidTarget(format!(
            "{} on '{}' needs {what}",
            target.operation, target.type_name
        ))),
        None => Ok(()),
    }
}
