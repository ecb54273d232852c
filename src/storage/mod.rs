//! Storage collaborator.
//!
//! The repo layer compiles queries into [`Statement`]s and hands them to a
//! [`Storage`] engine in two steps: `prepare` validates and compiles, and
//! `execute` runs the compiled statement with its bound parameters.
//! [`MemoryStorage`] is a reference engine kept entirely in memory.

mod memory;
mod statement;

pub use memory::MemoryStorage;
pub use statement::{Condition, ParameterHolder, Parameters, Statement};

use crate::error::Result;
use crate::types::Row;

/// A statement compiled by a storage engine.
#[derive(Clone, Debug)]
pub struct Prepared {
    statement: Statement,
    sql: String,
}

impl Prepared {
    pub fn new(statement: Statement) -> Self {
        let sql = statement.to_sql();
        Self { statement, sql }
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// SQL text with `?N` placeholders, for SQL-backed engines.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Engine that can compile and run statements.
///
/// Implementations must be safe to call from several threads at once;
/// subscription workers recompute queries in parallel.
pub trait Storage: Send + Sync {
    /// Compile a statement. Fails when the engine cannot run it, e.g. the
    /// relation does not exist.
    fn prepare(&self, statement: &Statement) -> Result<Prepared>;

    /// Run a compiled statement. Reads return rows; mutations return none.
    fn execute(&self, prepared: &Prepared, parameters: &Parameters) -> Result<Vec<Row>>;
}
