//! Filter and ordering terms.

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::encode::encode_component;

/// Comparison applied by a filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "not.eq")]
    NotEq,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "not.gte")]
    NotGte,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "not.lte")]
    NotLte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not.in")]
    NotIn,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gte,
        Operator::NotGte,
        Operator::Lte,
        Operator::NotLte,
        Operator::In,
        Operator::NotIn,
    ];

    /// Wire name, e.g. `not.in`.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::NotEq => "not.eq",
            Operator::Gte => "gte",
            Operator::NotGte => "not.gte",
            Operator::Lte => "lte",
            Operator::NotLte => "not.lte",
            Operator::In => "in",
            Operator::NotIn => "not.in",
        }
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Operator::NotEq | Operator::NotGte | Operator::NotLte | Operator::NotIn
        )
    }

    /// `in` and `not.in` take a value list; the rest take one value.
    pub fn is_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// The operator without its `not.` prefix.
    pub fn positive(self) -> Operator {
        match self {
            Operator::NotEq => Operator::Eq,
            Operator::NotGte => Operator::Gte,
            Operator::NotLte => Operator::Lte,
            Operator::NotIn => Operator::In,
            other => other,
        }
    }

    pub(crate) fn negate_if(self, not: bool) -> Operator {
        if !not {
            return self;
        }
        match self {
            Operator::Eq => Operator::NotEq,
            Operator::Gte => Operator::NotGte,
            Operator::Lte => Operator::NotLte,
            Operator::In => Operator::NotIn,
            other => other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `key=op.value` condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub key: String,
    #[serde(rename = "type")]
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Filter {
    pub fn new(key: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            operator,
            values,
        }
    }
}

/// Renders the canonical fragment. List values are encoded, then sorted.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}.", encode_component(&self.key), self.operator)?;
        if self.operator.is_list() {
            let mut values: Vec<String> = self
                .values
                .iter()
                .map(|v| encode_component(&v.to_string()))
                .collect();
            values.sort();
            write!(f, "({})", values.join(","))
        } else {
            let value = self.values.first().map(Value::to_string).unwrap_or_default();
            f.write_str(&encode_component(&value))
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// One ordering key, highest priority first within a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub key: String,
    #[serde(rename = "type")]
    pub direction: Direction,
}

impl Order {
    pub fn new(key: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", encode_component(&self.key), self.direction.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_names() {
        let names: Vec<&str> = Operator::ALL.iter().map(|op| op.as_str()).collect();
        assert_eq!(
            names,
            ["eq", "not.eq", "gte", "not.gte", "lte", "not.lte", "in", "not.in"]
        );
        assert!(Operator::NotIn.is_negated());
        assert_eq!(Operator::NotIn.positive(), Operator::In);
        assert_eq!(Operator::Gte.negate_if(true), Operator::NotGte);
    }

    #[test]
    fn test_filter_fragment_sorts_list() {
        let filter = Filter::new(
            "boardId",
            Operator::NotIn,
            vec![Value::from("tech"), Value::from("anime")],
        );
        assert_eq!(filter.to_string(), "boardId=not.in.(anime,tech)");
    }

    #[test]
    fn test_filter_fragment_encodes() {
        let filter = Filter::new("name", Operator::Eq, vec![Value::from("a b&c")]);
        assert_eq!(filter.to_string(), "name=eq.a%20b%26c");
    }

    #[test]
    fn test_order_fragment() {
        assert_eq!(Order::new("modifiedAt", Direction::Desc).to_string(), "modifiedAt.desc");
    }
}
