//! Row transformation helpers
//!
//! Steps read a source table into [`Row`]s, map them with pure functions and
//! write the result back with [`RowOps::insert_batch`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use sea_orm::sea_query::{Condition, Keyword, SimpleExpr};
use sea_orm::Value;

use crate::error::{MigrationError, Result};

/// Rows written per INSERT statement. Each chunk is atomic on its own.
pub const INSERT_CHUNK_ROWS: usize = 500;

/// How a selected column is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Text,
}

impl Kind {
    pub(crate) fn cast_type(self) -> &'static str {
        match self {
            Kind::Int => "BIGINT",
            Kind::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cell {
    Null,
    Int(i64),
    Text(String),
}

impl Cell {
    pub(crate) fn into_expr(self) -> SimpleExpr {
        match self {
            // Untyped so Postgres infers the column type
            Cell::Null => SimpleExpr::Keyword(Keyword::Null),
            Cell::Int(i) => SimpleExpr::Value(Value::BigInt(Some(i))),
            Cell::Text(s) => SimpleExpr::Value(Value::String(Some(Box::new(s)))),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Int(value.into())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// One row keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Row {
    cells: BTreeMap<String, Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        match self.cells.get(column) {
            Some(Cell::Int(i)) => Ok(*i),
            other => Err(self.mismatch(column, "integer", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<&str>> {
        match self.cells.get(column) {
            Some(Cell::Text(s)) => Ok(Some(s.as_str())),
            Some(Cell::Null) => Ok(None),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<&str> {
        match self.cells.get(column) {
            Some(Cell::Text(s)) => Ok(s.as_str()),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub(crate) fn into_cells(self) -> BTreeMap<String, Cell> {
        self.cells
    }

    fn mismatch(&self, column: &str, expected: &str, found: Option<&Cell>) -> MigrationError {
        MigrationError::RowTransformationFailed(format!(
            "column '{}' should be {}, found {:?}",
            column, expected, found
        ))
    }
}

#[async_trait]
pub trait RowOps: Send + Sync {
    /// Read `columns` from every row of `table` matching `filter`, ordered by
    /// the requested columns
    async fn select_rows(
        &self,
        table: &str,
        columns: &[(&str, Kind)],
        filter: Option<Condition>,
    ) -> Result<Vec<Row>>;

    /// Insert `rows` in chunks of [`INSERT_CHUNK_ROWS`]; every row must carry
    /// the same columns
    async fn insert_batch(&self, table: &str, rows: Vec<Row>) -> Result<u64>;

    async fn update_rows(
        &self,
        table: &str,
        values: Vec<(String, Cell)>,
        filter: Condition,
    ) -> Result<u64>;
}
