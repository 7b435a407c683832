//! Schema operation facade
//!
//! The abstract DDL surface every migration step talks to. Steps describe
//! tables with [`Field`] and [`Key`] and never build backend-specific SQL
//! themselves; [`crate::services::storage::SeaStorage`] turns the calls into
//! sea-query statements for the connected backend.

use async_trait::async_trait;
use sea_orm::Value;

use crate::error::Result;

/// Declared column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Char(u32),
    Varchar(u32),
    Text,
    /// A type name copied verbatim from an existing table
    Custom(String),
}

/// Column definition used by `create_table`, `add_column` and `modify_column`
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldType,
    pub nullable: bool,
    pub auto_increment: bool,
    pub default: Option<Value>,
    /// Default as a raw SQL expression, as reported by the database
    pub default_expr: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            auto_increment: false,
            default: None,
            default_expr: None,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn char(name: impl Into<String>, len: u32) -> Self {
        Self::new(name, FieldType::Char(len))
    }

    pub fn varchar(name: impl Into<String>, len: u32) -> Self {
        Self::new(name, FieldType::Varchar(len))
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default_expr = Some(expr.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Primary,
    Unique,
    Index,
}

/// A primary key or secondary index over one or more columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub name: String,
    pub columns: Vec<String>,
    pub kind: KeyKind,
}

impl Key {
    pub const PRIMARY: &'static str = "PRIMARY";

    pub fn primary(columns: &[&str]) -> Self {
        Self {
            name: Self::PRIMARY.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind: KeyKind::Primary,
        }
    }

    pub fn index(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind: KeyKind::Index,
        }
    }

    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            kind: KeyKind::Unique,
            ..Self::index(name, columns)
        }
    }
}

/// A column as reported by the live database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type including its width, e.g. `char(1)` or `character varying(100)`
    pub sql_type: String,
    pub nullable: bool,
    /// DEFAULT clause as an SQL expression
    pub default: Option<String>,
}

impl ColumnInfo {
    /// A field that recreates this column with its declared type and default.
    /// Sequence defaults stay with the source table.
    pub fn to_field(&self) -> Field {
        let mut field = Field::new(self.name.clone(), FieldType::Custom(self.sql_type.clone()));
        if self.nullable {
            field = field.nullable();
        }
        match &self.default {
            Some(expr) if !expr.starts_with("nextval(") => field.default_expr(expr.clone()),
            _ => field,
        }
    }
}

#[async_trait]
pub trait SchemaOps: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool>;

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    /// Columns of `table` in declaration order; empty if the table is missing
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Create `table`. Non-primary keys are added as separate indexes.
    async fn create_table(&self, table: &str, fields: &[Field], keys: &[Key]) -> Result<()>;

    async fn drop_table(&self, table: &str) -> Result<()>;

    async fn rename_table(&self, from: &str, to: &str) -> Result<()>;

    async fn add_column(&self, table: &str, field: &Field) -> Result<()>;

    async fn drop_column(&self, table: &str, column: &str) -> Result<()>;

    /// Rename `old_name` to `field.name` and retype it to `field.kind`
    async fn modify_column(&self, table: &str, old_name: &str, field: &Field) -> Result<()>;

    async fn add_key(&self, table: &str, key: &Key) -> Result<()>;

    async fn drop_key(&self, table: &str, name: &str) -> Result<()>;

    /// `INSERT INTO to (dst…) SELECT src… FROM from`, returning the row count
    async fn copy_rows(&self, from: &str, to: &str, columns: &[(String, String)]) -> Result<u64>;

    /// Move the auto-increment counter of `table.column` past the largest
    /// stored value, so rows inserted without an id do not collide
    async fn sync_sequence(&self, table: &str, column: &str) -> Result<()>;

    async fn execute_raw(&self, statement: &str) -> Result<u64>;
}
