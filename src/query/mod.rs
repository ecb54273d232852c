//! Canonical queries: filters, ordering and pagination.
//!
//! A [`Query`] parses permissively from a wire string and prints back to a
//! canonical form where every fragment is sorted, so two queries that mean
//! the same thing print the same way. The canonical string is also the
//! repo cache key.
//!
//! # Example
//!
//! ```
//! use livesync::query::Query;
//!
//! let query = Query::parse("order=price.desc&name=not.in.(table,chair)&limit=3");
//! assert_eq!(query.limit, 3);
//! assert_eq!(
//!     query.to_string(),
//!     "limit=3&name=not.in.(chair,table)&order=price.desc"
//! );
//!
//! // Unknown operators are dropped, not rejected.
//! assert!(Query::parse("foo=bogus.value").filters.is_empty());
//! ```

mod builder;
mod encode;
mod filter;
mod parse;

pub use builder::{Field, QueryBuilder};
pub use encode::{decode_component, encode_component};
pub use filter::{Direction, Filter, Operator, Order};

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Keys the wire form reserves for pagination and ordering. A filter on one
/// of them cannot survive a parse of its canonical string.
pub const RESERVED_KEYS: [&str; 3] = ["limit", "offset", "order"];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Filters, ordering and pagination over one record type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Conjoined conditions.
    pub filters: Vec<Filter>,

    /// Maximum rows returned (0 = unbounded).
    pub limit: u64,

    /// Rows skipped after ordering (0 = none).
    pub offset: u64,

    /// Sort keys in priority order.
    pub order: Vec<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a wire query string. Never fails: malformed fragments are dropped.
    pub fn parse(raw: &str) -> Self {
        parse::parse(raw)
    }

    /// Canonical form, used as the cache key.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// True when two queries select the same rows in the same order.
    pub fn is_equivalent(&self, other: &Query) -> bool {
        self.canonical() == other.canonical()
    }

    /// True when the query has no filters, ordering or pagination.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.order.is_empty() && self.limit == 0 && self.offset == 0
    }

    /// Add a filter.
    pub fn filter(mut self, key: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        self.filters.push(Filter::new(key, operator, values));
        self
    }

    /// Append an ordering key.
    pub fn order_by(mut self, key: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order::new(key, direction));
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fragments: Vec<String> = self.filters.iter().map(Filter::to_string).collect();

        if self.limit > 0 {
            fragments.push(format!("limit={}", self.limit));
        }
        if self.offset > 0 {
            fragments.push(format!("offset={}", self.offset));
        }
        if !self.order.is_empty() {
            let terms: Vec<String> = self.order.iter().map(Order::to_string).collect();
            fragments.push(format!("order={}", terms.join(",")));
        }

        fragments.sort();
        f.write_str(&fragments.join("&"))
    }
}

impl FromStr for Query {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Query::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_is_sorted() {
        let query = Query::new()
            .filter("parentId", Operator::Eq, vec![Value::from("")])
            .filter("modifiedAt", Operator::Lte, vec![Value::from(1534983769558i64)])
            .filter("boardId", Operator::NotIn, vec![Value::from("tech"), Value::from("anime")])
            .order_by("modifiedAt", Direction::Desc)
            .with_limit(15)
            .with_offset(30);

        assert_eq!(
            query.to_string(),
            "boardId=not.in.(anime,tech)&limit=15&modifiedAt=lte.1534983769558\
             &offset=30&order=modifiedAt.desc&parentId=eq."
        );
    }

    #[test]
    fn test_construction_order_does_not_matter() {
        let a = Query::new()
            .filter("a", Operator::Eq, vec![Value::from(1)])
            .filter("b", Operator::In, vec![Value::from("y"), Value::from("x")]);
        let b = Query::new()
            .filter("b", Operator::In, vec![Value::from("x"), Value::from("y")])
            .filter("a", Operator::Eq, vec![Value::from("1")]);
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_order_priority_kept() {
        let query = Query::new()
            .order_by("price", Direction::Desc)
            .order_by("name", Direction::Asc);
        assert_eq!(query.to_string(), "order=price.desc,name.asc");
    }

    #[test]
    fn test_empty_query() {
        assert!(Query::new().is_empty());
        assert_eq!(Query::new().to_string(), "");
    }

    #[test]
    fn test_reserved_key_filter_does_not_round_trip() {
        let query = Query::new().filter("order", Operator::Eq, vec![Value::from("1")]);
        assert!(is_reserved_key(&query.filters[0].key));
        assert!(Query::parse(&query.to_string()).filters.is_empty());
        assert!(!is_reserved_key("ordering"));
    }

    #[test]
    fn test_from_str() {
        let query: Query = "limit=2".parse().unwrap();
        assert_eq!(query.limit, 2);
    }
}
