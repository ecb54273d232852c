//! Routes and controllers.

use crate::error::{Result, SyncError};
use crate::model::Model;
use crate::query::Query;
use crate::repo::TypedRepo;
use crate::store::Store;
use crate::types::Row;
use serde_json::Value;
use std::sync::Arc;

/// What a controller sees of a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    /// Raw query string.
    pub query: String,
    pub body: Option<Value>,
}

impl Context {
    pub fn new(query: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            query: query.into(),
            body,
        }
    }

    /// The parsed query string.
    pub fn parsed_query(&self) -> Query {
        Query::parse(&self.query)
    }

    /// The body echoed back by mutations.
    fn echo(&self) -> Value {
        self.body.clone().unwrap_or(Value::Null)
    }
}

/// Request handlers for one path. Every verb defaults to 405.
pub trait Controller: Send + Sync {
    fn get(&self, _ctx: &Context) -> Result<Value> {
        Err(SyncError::MethodNotAllowed)
    }

    fn post(&self, _ctx: &Context) -> Result<Value> {
        Err(SyncError::MethodNotAllowed)
    }

    fn patch(&self, _ctx: &Context) -> Result<Value> {
        Err(SyncError::MethodNotAllowed)
    }

    fn delete(&self, _ctx: &Context) -> Result<Value> {
        Err(SyncError::MethodNotAllowed)
    }
}

/// An exact path, its controller, and the record types whose changes
/// refresh subscriptions made on it.
#[derive(Clone)]
pub struct Route {
    pub path: String,
    pub controller: Arc<dyn Controller>,
    pub watches: Vec<String>,
}

impl Route {
    pub fn new(path: impl Into<String>, controller: Arc<dyn Controller>) -> Self {
        Self {
            path: path.into(),
            controller,
            watches: Vec::new(),
        }
    }

    /// Refresh subscriptions on this route when `M` changes.
    pub fn watching<M: Model>(self) -> Self {
        self.watching_type(M::NAME)
    }

    pub fn watching_type(mut self, record_type: impl Into<String>) -> Self {
        let record_type = record_type.into();
        if !self.watches.contains(&record_type) {
            self.watches.push(record_type);
        }
        self
    }
}

type DeleteGuard = Arc<dyn Fn(&Context) -> Result<()> + Send + Sync>;

/// Repo-backed CRUD for one record type.
///
/// - `GET` returns the rows matching the query string.
/// - `POST` inserts a record or an array of records and echoes the body.
/// - `PATCH` applies the body (an object, or the first element of an
///   array) to every row matching the query string.
/// - `DELETE` removes matching rows, after the delete guard agrees.
pub struct ModelController<M> {
    repo: TypedRepo<M>,
    delete_guard: Option<DeleteGuard>,
}

impl<M: Model> ModelController<M> {
    pub fn new(repo: TypedRepo<M>) -> Self {
        Self {
            repo,
            delete_guard: None,
        }
    }

    pub fn for_store(store: &Store) -> Self {
        Self::new(store.repo::<M>())
    }

    /// Reject deletes the guard returns an error for, e.g. unfiltered ones.
    pub fn with_delete_guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Context) -> Result<()> + Send + Sync + 'static,
    {
        self.delete_guard = Some(Arc::new(guard));
        self
    }

    /// Validate a body row against `M`.
    fn record(value: &Value) -> Result<Row> {
        let Value::Object(row) = value else {
            return Err(SyncError::InvalidInput(format!(
                "expected a {} object",
                M::NAME
            )));
        };
        M::from_row(row.clone())
            .and_then(|record| record.to_row())
            .map_err(|e| SyncError::InvalidInput(e.to_string()))
    }
}

impl<M: Model> Controller for ModelController<M> {
    fn get(&self, ctx: &Context) -> Result<Value> {
        let rows = self.repo.untyped().get(&ctx.parsed_query())?;
        Ok(Value::Array(
            rows.iter().cloned().map(Value::Object).collect(),
        ))
    }

    fn post(&self, ctx: &Context) -> Result<Value> {
        let rows = match &ctx.body {
            Some(Value::Array(items)) => items.iter().map(Self::record).collect::<Result<Vec<_>>>()?,
            Some(item @ Value::Object(_)) => vec![Self::record(item)?],
            _ => {
                return Err(SyncError::InvalidInput(
                    "POST expects a record or an array of records".into(),
                ))
            }
        };
        self.repo.untyped().post(&rows)?;
        Ok(ctx.echo())
    }

    fn patch(&self, ctx: &Context) -> Result<Value> {
        let diff = match &ctx.body {
            Some(Value::Array(items)) => items.first(),
            Some(item) => Some(item),
            None => None,
        };
        let Some(Value::Object(diff)) = diff else {
            return Err(SyncError::InvalidInput("PATCH expects an object".into()));
        };
        self.repo.untyped().patch(diff, &ctx.parsed_query())?;
        Ok(ctx.echo())
    }

    fn delete(&self, ctx: &Context) -> Result<Value> {
        if let Some(guard) = &self.delete_guard {
            guard(ctx)?;
        }
        self.repo.delete(&ctx.parsed_query())?;
        Ok(ctx.echo())
    }
}
