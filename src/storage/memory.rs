//! In-memory storage engine.

use super::statement::{Condition, Parameters, Statement};
use super::{Prepared, Storage};
use crate::error::{Result, SyncError};
use crate::query::{Direction, Operator, Order};
use crate::types::{Row, Value};
use parking_lot::RwLock;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::trace;

/// Relations held as insertion-ordered row lists.
///
/// Comparison follows loose SQL affinity: a numeric column compares
/// numerically with any parameter that reads as a number, a boolean column
/// with `true`/`false`, everything else as text. NULL satisfies no
/// predicate, negated or not, and sorts first.
pub struct MemoryStorage {
    relations: RwLock<HashMap<String, Vec<Row>>>,
    executions: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            executions: AtomicU64::new(0),
        }
    }

    /// Create a storage with the given (empty) relations.
    pub fn with_relations<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let storage = Self::new();
        for name in names {
            storage.create_relation(name);
        }
        storage
    }

    /// Create an empty relation. Returns false if it already existed.
    pub fn create_relation(&self, name: impl Into<String>) -> bool {
        let mut relations = self.relations.write();
        let name = name.into();
        if relations.contains_key(&name) {
            return false;
        }
        relations.insert(name, Vec::new());
        true
    }

    /// Drop a relation and its rows. Returns false if it did not exist.
    pub fn drop_relation(&self, name: &str) -> bool {
        self.relations.write().remove(name).is_some()
    }

    /// Rows of a relation in insertion order.
    pub fn rows(&self, name: &str) -> Option<Vec<Row>> {
        self.relations.read().get(name).cloned()
    }

    /// Number of `execute` calls served so far.
    pub fn execution_count(&self) -> u64 {
        self.executions.load(AtomicOrdering::SeqCst)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn prepare(&self, statement: &Statement) -> Result<Prepared> {
        if !self.relations.read().contains_key(statement.relation()) {
            return Err(SyncError::UnknownRelation(statement.relation().to_string()));
        }
        Ok(Prepared::new(statement.clone()))
    }

    fn execute(&self, prepared: &Prepared, parameters: &Parameters) -> Result<Vec<Row>> {
        self.executions.fetch_add(1, AtomicOrdering::SeqCst);
        trace!(sql = prepared.sql(), "memory execute");

        let statement = prepared.statement();
        let relation = statement.relation();

        if !statement.is_mutation() {
            let relations = self.relations.read();
            let rows = relations
                .get(relation)
                .ok_or_else(|| SyncError::UnknownRelation(relation.to_string()))?;
            return Ok(select(rows, statement, parameters));
        }

        let mut relations = self.relations.write();
        let rows = relations
            .get_mut(relation)
            .ok_or_else(|| SyncError::UnknownRelation(relation.to_string()))?;

        match statement {
            Statement::Insert { fields, rows: new_rows, .. } => {
                for placeholders in new_rows {
                    let mut row = Row::new();
                    for (field, p) in fields.iter().zip(placeholders) {
                        row.insert(field.clone(), param(parameters, *p));
                    }
                    rows.push(row);
                }
            }
            Statement::Update {
                assignments,
                filter,
                ..
            } => {
                for row in rows.iter_mut().filter(|row| matches_all(row, filter, parameters)) {
                    for (field, p) in assignments {
                        row.insert(field.clone(), param(parameters, *p));
                    }
                }
            }
            Statement::Delete {
                filter,
                order,
                limit,
                ..
            } => {
                let mut doomed: Vec<usize> = (0..rows.len())
                    .filter(|&i| matches_all(&rows[i], filter, parameters))
                    .collect();
                if !order.is_empty() {
                    doomed.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], order));
                }
                if *limit > 0 {
                    doomed.truncate(*limit as usize);
                }
                let doomed: HashSet<usize> = doomed.into_iter().collect();
                let mut index = 0;
                rows.retain(|_| {
                    let keep = !doomed.contains(&index);
                    index += 1;
                    keep
                });
            }
            Statement::Select { .. } => {}
        }

        Ok(Vec::new())
    }
}

fn select(rows: &[Row], statement: &Statement, parameters: &Parameters) -> Vec<Row> {
    let Statement::Select {
        fields,
        filter,
        order,
        limit,
        offset,
        ..
    } = statement
    else {
        return Vec::new();
    };

    let mut matched: Vec<&Row> = rows
        .iter()
        .filter(|row| matches_all(row, filter, parameters))
        .collect();

    if !order.is_empty() {
        matched.sort_by(|a, b| compare_rows(a, b, order));
    }

    let take = if *limit > 0 { *limit as usize } else { usize::MAX };

    matched
        .into_iter()
        .skip(*offset as usize)
        .take(take)
        .map(|row| {
            fields
                .iter()
                .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Json::Null)))
                .collect()
        })
        .collect()
}

fn param(parameters: &Parameters, index: usize) -> Json {
    parameters.get(index).cloned().unwrap_or(Json::Null)
}

fn matches_all(row: &Row, filter: &[Condition], parameters: &Parameters) -> bool {
    filter
        .iter()
        .all(|condition| evaluate(row, condition, parameters) == Some(true))
}

/// Three-valued evaluation: `None` is SQL's unknown.
fn evaluate(row: &Row, condition: &Condition, parameters: &Parameters) -> Option<bool> {
    let column = row.get(&condition.field).unwrap_or(&Json::Null);
    let params: Vec<Json> = condition
        .params
        .iter()
        .map(|p| param(parameters, *p))
        .collect();

    let first = || params.first().and_then(|p| compare(column, p));

    let positive = match condition.operator.positive() {
        Operator::Eq => first().map(|o| o == Ordering::Equal),
        Operator::Gte => first().map(|o| o != Ordering::Less),
        Operator::Lte => first().map(|o| o != Ordering::Greater),
        _ => {
            let mut unknown = false;
            let mut found = false;
            for p in &params {
                match compare(column, p) {
                    Some(Ordering::Equal) => {
                        found = true;
                        break;
                    }
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            if found {
                Some(true)
            } else if unknown {
                None
            } else {
                Some(false)
            }
        }
    };

    if condition.operator.is_negated() {
        positive.map(|b| !b)
    } else {
        positive
    }
}

/// Compare a column value against a parameter. `None` when either is NULL.
fn compare(column: &Json, param: &Json) -> Option<Ordering> {
    if column.is_null() || param.is_null() {
        return None;
    }

    let param_value = Value::from_json(param);

    match column {
        Json::Number(n) => {
            if let (Some(a), Some(b)) = (n.as_f64(), param_value.as_ref().and_then(Value::as_f64)) {
                return a.partial_cmp(&b);
            }
        }
        Json::Bool(a) => {
            if let Some(b) = param_value.as_ref().and_then(Value::as_bool) {
                return Some(a.cmp(&b));
            }
        }
        _ => {}
    }

    Some(text(column).cmp(&text(param)))
}

fn text(value: &Json) -> String {
    match Value::from_json(value) {
        Some(v) => v.to_string(),
        None => value.to_string(),
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[Order]) -> Ordering {
    for key in order {
        let left = a.get(&key.key).unwrap_or(&Json::Null);
        let right = b.get(&key.key).unwrap_or(&Json::Null);
        let ordering = sort_cmp(left, right);
        let ordering = match key.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// NULL < booleans < numbers < text < everything else.
fn sort_cmp(a: &Json, b: &Json) -> Ordering {
    fn rank(v: &Json) -> u8 {
        match v {
            Json::Null => 0,
            Json::Bool(_) => 1,
            Json::Number(_) => 2,
            Json::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Json::String(x), Json::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}
