//! Statement representation and parameter binding.

use crate::query::{Operator, Order};
use crate::types::Value;

/// Positional parameters, `?1` first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters(Vec<serde_json::Value>);

impl Parameters {
    /// Parameter bound to placeholder `?index` (1-based).
    pub fn get(&self, index: usize) -> Option<&serde_json::Value> {
        index.checked_sub(1).and_then(|i| self.0.get(i))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Hands out placeholders while a statement is being compiled.
#[derive(Debug, Default)]
pub struct ParameterHolder {
    values: Vec<serde_json::Value>,
}

impl ParameterHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a JSON value and return its placeholder index.
    pub fn bind(&mut self, value: serde_json::Value) -> usize {
        self.values.push(value);
        self.values.len()
    }

    pub fn bind_value(&mut self, value: &Value) -> usize {
        self.bind(value.to_json())
    }

    pub fn into_parameters(self) -> Parameters {
        Parameters(self.values)
    }
}

/// `field <operator> params`. List operators use every param, the others the first.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub params: Vec<usize>,
}

impl Condition {
    fn to_sql(&self) -> String {
        let placeholders: Vec<String> = self.params.iter().map(|p| format!("?{}", p)).collect();
        let op = match self.operator {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gte => ">=",
            Operator::NotGte => "<",
            Operator::Lte => "<=",
            Operator::NotLte => ">",
            Operator::In => "in",
            Operator::NotIn => "not in",
        };
        if self.operator.is_list() {
            format!("({} {} ({}))", self.field, op, placeholders.join(","))
        } else {
            let first = placeholders.first().cloned().unwrap_or_else(|| "null".to_string());
            format!("({} {} {})", self.field, op, first)
        }
    }
}

/// A compiled operation against one relation.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select {
        relation: String,
        fields: Vec<String>,
        filter: Vec<Condition>,
        order: Vec<Order>,
        limit: u64,
        offset: u64,
    },
    Insert {
        relation: String,
        fields: Vec<String>,
        /// One placeholder per field, per row.
        rows: Vec<Vec<usize>>,
    },
    Update {
        relation: String,
        assignments: Vec<(String, usize)>,
        filter: Vec<Condition>,
    },
    Delete {
        relation: String,
        filter: Vec<Condition>,
        order: Vec<Order>,
        limit: u64,
    },
}

impl Statement {
    pub fn relation(&self) -> &str {
        match self {
            Statement::Select { relation, .. }
            | Statement::Insert { relation, .. }
            | Statement::Update { relation, .. }
            | Statement::Delete { relation, .. } => relation,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Statement::Select { .. })
    }

    /// Render SQL text with `?N` placeholders.
    pub fn to_sql(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        match self {
            Statement::Select {
                relation,
                fields,
                filter,
                order,
                limit,
                offset,
            } => {
                parts.push(format!("select {} from {}", fields.join(","), relation));
                parts.extend(where_clause(filter));
                parts.extend(order_clause(order));
                if *limit > 0 {
                    parts.push(format!("limit {}", limit));
                }
                if *offset > 0 {
                    parts.push(format!("offset {}", offset));
                }
            }
            Statement::Insert {
                relation,
                fields,
                rows,
            } => {
                let values: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let row: Vec<String> = row.iter().map(|p| format!("?{}", p)).collect();
                        format!("({})", row.join(","))
                    })
                    .collect();
                parts.push(format!(
                    "insert into {}({}) values {}",
                    relation,
                    fields.join(","),
                    values.join(",")
                ));
            }
            Statement::Update {
                relation,
                assignments,
                filter,
            } => {
                let set: Vec<String> = assignments
                    .iter()
                    .map(|(field, p)| format!("{}=?{}", field, p))
                    .collect();
                parts.push(format!("update {} set {}", relation, set.join(",")));
                parts.extend(where_clause(filter));
            }
            Statement::Delete {
                relation,
                filter,
                order,
                limit,
            } => {
                parts.push(format!("delete from {}", relation));
                parts.extend(where_clause(filter));
                parts.extend(order_clause(order));
                if *limit > 0 {
                    parts.push(format!("limit {}", limit));
                }
            }
        }

        parts.join(" ")
    }
}

fn where_clause(filter: &[Condition]) -> Option<String> {
    if filter.is_empty() {
        return None;
    }
    let conditions: Vec<String> = filter.iter().map(Condition::to_sql).collect();
    Some(format!("where {}", conditions.join(" and ")))
}

fn order_clause(order: &[Order]) -> Option<String> {
    if order.is_empty() {
        return None;
    }
    let keys: Vec<String> = order
        .iter()
        .map(|o| format!("{} {}", o.key, o.direction.as_str()))
        .collect();
    Some(format!("order by {}", keys.join(",")))
}
