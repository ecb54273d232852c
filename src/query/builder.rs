//! Typed query construction per record type.

use super::filter::{Direction, Filter, Operator, Order};
use super::Query;
use crate::model::Model;
use crate::types::Value;
use std::fmt;
use std::marker::PhantomData;

/// A named field of record type `M` holding values of type `T`.
///
/// Declared by the [`model!`](crate::model!) macro, so a field of one
/// record type cannot be used to filter another.
pub struct Field<M, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (M, T)>,
}

impl<M, T> Field<M, T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<M, T> Clone for Field<M, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, T> Copy for Field<M, T> {}

impl<M, T> fmt::Debug for Field<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.name)
    }
}

/// Fluent builder over the fields of one record type.
///
/// ```
/// use livesync::model;
/// use serde::{Deserialize, Serialize};
///
/// model! {
///     #[derive(Clone, Debug, Default, Serialize, Deserialize)]
///     pub struct Post {
///         pub board_id: String => BOARD_ID,
///         pub modified_at: f64 => MODIFIED_AT,
///     }
/// }
///
/// let query = Post::query()
///     .not_in(Post::BOARD_ID, ["anime", "tech"])
///     .lte(Post::MODIFIED_AT, 1534983769558.0)
///     .desc(Post::MODIFIED_AT)
///     .limit(15)
///     .build();
///
/// assert_eq!(
///     query.to_string(),
///     "board_id=not.in.(anime,tech)&limit=15&modified_at=lte.1534983769558&order=modified_at.desc"
/// );
/// ```
pub struct QueryBuilder<M> {
    query: Query,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> QueryBuilder<M> {
    pub fn new() -> Self {
        Self {
            query: Query::default(),
            _model: PhantomData,
        }
    }

    fn scalar<T: Into<Value>>(mut self, field: Field<M, T>, operator: Operator, value: T) -> Self {
        self.query
            .filters
            .push(Filter::new(field.name, operator, vec![value.into()]));
        self
    }

    fn list<T, I, V>(mut self, field: Field<M, T>, operator: Operator, values: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = V>,
        V: Into<T>,
    {
        let values = values
            .into_iter()
            .map(|v| {
                let v: T = v.into();
                v.into()
            })
            .collect();
        self.query
            .filters
            .push(Filter::new(field.name, operator, values));
        self
    }

    pub fn eq<T: Into<Value>>(self, field: Field<M, T>, value: impl Into<T>) -> Self {
        self.scalar(field, Operator::Eq, value.into())
    }

    pub fn not_eq<T: Into<Value>>(self, field: Field<M, T>, value: impl Into<T>) -> Self {
        self.scalar(field, Operator::NotEq, value.into())
    }

    pub fn gte<T: Into<Value>>(self, field: Field<M, T>, value: impl Into<T>) -> Self {
        self.scalar(field, Operator::Gte, value.into())
    }

    pub fn not_gte<T: Into<Value>>(self, field: Field<M, T>, value: impl Into<T>) -> Self {
        self.scalar(field, Operator::NotGte, value.into())
    }

    pub fn lte<T: Into<Value>>(self, field: Field<M, T>, value: impl Into<T>) -> Self {
        self.scalar(field, Operator::Lte, value.into())
    }

    pub fn not_lte<T: Into<Value>>(self, field: Field<M, T>, value: impl Into<T>) -> Self {
        self.scalar(field, Operator::NotLte, value.into())
    }

    pub fn is_in<T, V>(self, field: Field<M, T>, values: impl IntoIterator<Item = V>) -> Self
    where
        T: Into<Value>,
        V: Into<T>,
    {
        self.list(field, Operator::In, values)
    }

    pub fn not_in<T, V>(self, field: Field<M, T>, values: impl IntoIterator<Item = V>) -> Self
    where
        T: Into<Value>,
        V: Into<T>,
    {
        self.list(field, Operator::NotIn, values)
    }

    pub fn asc<T>(mut self, field: Field<M, T>) -> Self {
        self.query.order.push(Order::new(field.name, Direction::Asc));
        self
    }

    pub fn desc<T>(mut self, field: Field<M, T>) -> Self {
        self.query.order.push(Order::new(field.name, Direction::Desc));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset = offset;
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

impl<M: Model> Default for QueryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> From<QueryBuilder<M>> for Query {
    fn from(builder: QueryBuilder<M>) -> Self {
        builder.query
    }
}

impl<M> fmt::Display for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.query.fmt(f)
    }
}
