//! Query execution, result caching and mutation.
//!
//! A [`Repo`] serves one record type. Reads are cached by canonical query
//! string; every mutation clears the whole cache of that repo and then
//! publishes a [`ChangeEvent`] so live subscriptions can recompute.

mod cache;
mod feed;

pub use cache::CachedResult;
pub use feed::{ChangeEvent, ChangeFeed};

use crate::error::{Result, SyncError};
use crate::model::{Model, Schema};
use crate::query::{is_reserved_key, Order, Query};
use crate::storage::{Condition, ParameterHolder, Statement, Storage};
use crate::types::Row;
use cache::QueryCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// Repo configuration.
#[derive(Clone, Debug)]
pub struct RepoConfig {
    /// Entries kept after an eviction pass.
    pub max_caches: usize,

    /// Eviction runs once the cache exceeds `max_caches * garbage_factor`.
    pub garbage_factor: usize,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            max_caches: 100,
            garbage_factor: 2,
        }
    }
}

/// Data access for one record type.
pub struct Repo {
    schema: Schema,
    storage: Arc<dyn Storage>,
    cache: Mutex<QueryCache>,
    feed: ChangeFeed,
}

impl Repo {
    pub fn new(
        schema: Schema,
        storage: Arc<dyn Storage>,
        config: RepoConfig,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            schema,
            storage,
            cache: Mutex::new(QueryCache::new(config.max_caches, config.garbage_factor)),
            feed,
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Number of cached query results.
    pub fn cached_queries(&self) -> usize {
        self.cache.lock().len()
    }

    /// Cached entry for a query, if any.
    pub fn cached(&self, query: &Query) -> Option<CachedResult> {
        self.cache.lock().get(&query.canonical()).cloned()
    }

    /// Rows matching `query`, served from cache when possible.
    pub fn get(&self, query: &Query) -> Result<Arc<Vec<Row>>> {
        let key = query.canonical();

        let generation = {
            let cache = self.cache.lock();
            if let Some(hit) = cache.get(&key) {
                debug!(record_type = self.schema.name, query = %key, "cache hit");
                return Ok(Arc::clone(&hit.rows));
            }
            cache.generation()
        };

        debug!(record_type = self.schema.name, query = %key, "cache miss");

        let mut holder = ParameterHolder::new();
        let statement = Statement::Select {
            relation: self.schema.name.to_string(),
            fields: self.fields(),
            filter: self.conditions(query, &mut holder)?,
            order: self.order(query)?,
            limit: query.limit,
            offset: query.offset,
        };
        let rows = Arc::new(self.run(&statement, holder)?);

        if !self.cache.lock().insert(generation, key, Arc::clone(&rows)) {
            trace!(record_type = self.schema.name, "read raced a mutation, not cached");
        }

        Ok(rows)
    }

    /// Insert rows. Fields missing from a row are stored as null.
    pub fn post(&self, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut holder = ParameterHolder::new();
        let placeholders: Vec<Vec<usize>> = rows
            .iter()
            .map(|row| {
                self.schema
                    .fields
                    .iter()
                    .map(|field| holder.bind(row.get(*field).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect();

        let statement = Statement::Insert {
            relation: self.schema.name.to_string(),
            fields: self.fields(),
            rows: placeholders,
        };
        self.mutate(&statement, holder)
    }

    /// Update the known fields present in `diff` on every row matching `query`.
    pub fn patch(&self, diff: &Row, query: &Query) -> Result<()> {
        let mut holder = ParameterHolder::new();
        let assignments: Vec<(String, usize)> = self
            .schema
            .fields
            .iter()
            .filter_map(|field| {
                diff.get(*field)
                    .map(|value| (field.to_string(), holder.bind(value.clone())))
            })
            .collect();

        if assignments.is_empty() {
            return Err(SyncError::InvalidInput(format!(
                "patch touches no field of {}",
                self.schema.name
            )));
        }

        let statement = Statement::Update {
            relation: self.schema.name.to_string(),
            assignments,
            filter: self.conditions(query, &mut holder)?,
        };
        self.mutate(&statement, holder)
    }

    /// Delete matching rows, honouring order and limit.
    pub fn delete(&self, query: &Query) -> Result<()> {
        let mut holder = ParameterHolder::new();
        let statement = Statement::Delete {
            relation: self.schema.name.to_string(),
            filter: self.conditions(query, &mut holder)?,
            order: self.order(query)?,
            limit: query.limit,
        };
        self.mutate(&statement, holder)
    }

    /// Drop every cached result.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    fn mutate(&self, statement: &Statement, holder: ParameterHolder) -> Result<()> {
        self.run(statement, holder)?;
        self.invalidate();
        debug!(record_type = self.schema.name, "cache cleared after mutation");
        self.feed.publish(ChangeEvent::new(self.schema.name));
        Ok(())
    }

    fn run(&self, statement: &Statement, holder: ParameterHolder) -> Result<Vec<Row>> {
        let prepared = self.storage.prepare(statement)?;
        trace!(sql = prepared.sql(), "execute");
        self.storage.execute(&prepared, &holder.into_parameters())
    }

    fn fields(&self) -> Vec<String> {
        self.schema.fields.iter().map(|f| f.to_string()).collect()
    }

    fn check_field(&self, field: &str) -> Result<()> {
        if self.schema.has_field(field) {
            Ok(())
        } else {
            Err(SyncError::InvalidInput(format!(
                "{} has no field {}",
                self.schema.name, field
            )))
        }
    }

    fn conditions(&self, query: &Query, holder: &mut ParameterHolder) -> Result<Vec<Condition>> {
        query
            .filters
            .iter()
            .map(|filter| {
                if is_reserved_key(&filter.key) {
                    return Err(SyncError::InvalidInput(format!(
                        "cannot filter on reserved key {}",
                        filter.key
                    )));
                }
                self.check_field(&filter.key)?;
                Ok(Condition {
                    field: filter.key.clone(),
                    operator: filter.operator,
                    params: filter.values.iter().map(|v| holder.bind_value(v)).collect(),
                })
            })
            .collect()
    }

    fn order(&self, query: &Query) -> Result<Vec<Order>> {
        for order in &query.order {
            self.check_field(&order.key)?;
        }
        Ok(query.order.clone())
    }
}

/// A [`Repo`] that converts rows to and from `M`.
pub struct TypedRepo<M> {
    inner: Arc<Repo>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> TypedRepo<M> {
    pub fn new(inner: Arc<Repo>) -> Self {
        Self {
            inner,
            _model: PhantomData,
        }
    }

    pub fn untyped(&self) -> &Arc<Repo> {
        &self.inner
    }

    pub fn get(&self, query: &Query) -> Result<Vec<M>> {
        self.inner
            .get(query)?
            .iter()
            .map(|row| M::from_row(row.clone()))
            .collect()
    }

    pub fn post(&self, records: &[M]) -> Result<()> {
        let rows = records.iter().map(M::to_row).collect::<Result<Vec<_>>>()?;
        self.inner.post(&rows)
    }

    /// Apply a partial record, e.g. `json!({"price": 1.99})`.
    pub fn patch<D: Serialize>(&self, diff: &D, query: &Query) -> Result<()> {
        match serde_json::to_value(diff)? {
            serde_json::Value::Object(row) => self.inner.patch(&row, query),
            other => Err(SyncError::InvalidInput(format!(
                "patch must be an object, got {}",
                other
            ))),
        }
    }

    pub fn delete(&self, query: &Query) -> Result<()> {
        self.inner.delete(query)
    }
}

impl<M> Clone for TypedRepo<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _model: PhantomData,
        }
    }
}
