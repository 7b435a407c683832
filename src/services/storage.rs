use async_trait::async_trait;
use sea_orm::sea_query::{Condition, Expr, Func, Order};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, QueryResult, Statement};
use sea_orm_migration::prelude::{Alias, ColumnDef, Index, Query, Table};
use sea_orm_migration::SchemaManager;

use crate::error::{MigrationError, Result};
use crate::services::rows::{Cell, Kind, Row, RowOps, INSERT_CHUNK_ROWS};
use crate::services::schema::{ColumnInfo, Field, FieldType, Key, KeyKind, SchemaOps};

/// Everything a migration step may touch
pub trait Storage: SchemaOps + RowOps {}

impl<T: SchemaOps + RowOps> Storage for T {}

/// [`Storage`] backed by a sea-orm connection (SQLite or PostgreSQL)
#[derive(Debug, Clone)]
pub struct SeaStorage {
    db: DatabaseConnection,
}

impl SeaStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn manager(&self) -> SchemaManager<'_> {
        SchemaManager::new(&self.db)
    }

    fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    async fn query(&self, sql: String) -> Result<Vec<QueryResult>> {
        Ok(self
            .db
            .query_all(Statement::from_string(self.backend(), sql))
            .await?)
    }
}

fn column_def(field: &Field) -> ColumnDef {
    let mut def = ColumnDef::new(Alias::new(&field.name));
    match &field.kind {
        FieldType::Int => def.integer(),
        FieldType::Char(len) => def.char_len(*len),
        FieldType::Varchar(len) => def.string_len(*len),
        FieldType::Text => def.text(),
        FieldType::Custom(name) => def.custom(Alias::new(name)),
    };
    if field.nullable {
        def.null();
    } else {
        def.not_null();
    }
    if let Some(default) = &field.default {
        def.default(default.clone());
    } else if let Some(expr) = &field.default_expr {
        def.default(Expr::cust(expr.clone()));
    }
    if field.auto_increment {
        def.auto_increment();
    }
    def
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl SchemaOps for SeaStorage {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.manager().has_table(table).await?)
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.manager().has_column(table, column).await?)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        match self.backend() {
            DbBackend::Sqlite => {
                let rows = self
                    .query(format!("PRAGMA table_info(\"{}\")", table.replace('"', "")))
                    .await?;
                rows.iter()
                    .map(|row| -> Result<ColumnInfo> {
                        let name: String = row.try_get("", "name")?;
                        let sql_type: String = row.try_get("", "type")?;
                        let notnull: i64 = row.try_get("", "notnull")?;
                        Ok(ColumnInfo {
                            name,
                            sql_type: if sql_type.is_empty() {
                                "text".to_string()
                            } else {
                                sql_type
                            },
                            nullable: notnull == 0,
                            default: row.try_get("", "dflt_value")?,
                        })
                    })
                    .collect()
            }
            DbBackend::Postgres => {
                let rows = self
                    .query(format!(
                        "SELECT column_name::text AS name, data_type::text AS type, \
                         is_nullable::text AS nullable, column_default::text AS default_expr, \
                         character_maximum_length::integer AS max_length \
                         FROM information_schema.columns \
                         WHERE table_name = {} AND table_schema = current_schema() \
                         ORDER BY ordinal_position",
                        quote_literal(table)
                    ))
                    .await?;
                rows.iter()
                    .map(|row| -> Result<ColumnInfo> {
                        let nullable: String = row.try_get("", "nullable")?;
                        let data_type: String = row.try_get("", "type")?;
                        let max_length: Option<i32> = row.try_get("", "max_length")?;
                        Ok(ColumnInfo {
                            name: row.try_get("", "name")?,
                            sql_type: match max_length {
                                Some(len) => format!("{}({})", data_type, len),
                                None => data_type,
                            },
                            nullable: nullable == "YES",
                            default: row.try_get("", "default_expr")?,
                        })
                    })
                    .collect()
            }
            other => Err(MigrationError::SchemaOperationFailed(format!(
                "Unsupported database backend: {:?}",
                other
            ))),
        }
    }

    async fn create_table(&self, table: &str, fields: &[Field], keys: &[Key]) -> Result<()> {
        tracing::debug!("Creating table {}", table);

        let primary = keys.iter().find(|k| k.kind == KeyKind::Primary);
        let single_primary = primary
            .filter(|k| k.columns.len() == 1)
            .map(|k| k.columns[0].as_str());

        let mut stmt = Table::create();
        stmt.table(Alias::new(table));
        for field in fields {
            let mut def = column_def(field);
            if single_primary == Some(field.name.as_str()) {
                def.primary_key();
            }
            stmt.col(def);
        }
        if let Some(key) = primary.filter(|k| k.columns.len() > 1) {
            let mut index = Index::create();
            for column in &key.columns {
                index.col(Alias::new(column));
            }
            stmt.primary_key(&mut index);
        }

        self.manager().create_table(stmt).await?;

        for key in keys.iter().filter(|k| k.kind != KeyKind::Primary) {
            self.add_key(table, key).await?;
        }
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        tracing::debug!("Dropping table {}", table);
        self.manager()
            .drop_table(Table::drop().table(Alias::new(table)).to_owned())
            .await?;
        Ok(())
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        tracing::debug!("Renaming table {} to {}", from, to);
        self.manager()
            .rename_table(
                Table::rename()
                    .table(Alias::new(from), Alias::new(to))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn add_column(&self, table: &str, field: &Field) -> Result<()> {
        tracing::debug!("Adding column {}.{}", table, field.name);
        self.manager()
            .alter_table(
                Table::alter()
                    .table(Alias::new(table))
                    .add_column(column_def(field))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        tracing::debug!("Dropping column {}.{}", table, column);
        self.manager()
            .alter_table(
                Table::alter()
                    .table(Alias::new(table))
                    .drop_column(Alias::new(column))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn modify_column(&self, table: &str, old_name: &str, field: &Field) -> Result<()> {
        // SQLite accepts one alteration per ALTER TABLE
        if old_name != field.name {
            tracing::debug!("Renaming column {}.{} to {}", table, old_name, field.name);
            self.manager()
                .alter_table(
                    Table::alter()
                        .table(Alias::new(table))
                        .rename_column(Alias::new(old_name), Alias::new(&field.name))
                        .to_owned(),
                )
                .await?;
        }

        match self.backend() {
            DbBackend::Sqlite => {
                // Declared types are advisory in SQLite and cannot be altered in place
                tracing::debug!("Keeping declared type of {}.{} on SQLite", table, field.name);
            }
            _ => {
                self.manager()
                    .alter_table(
                        Table::alter()
                            .table(Alias::new(table))
                            .modify_column(column_def(field))
                            .to_owned(),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn add_key(&self, table: &str, key: &Key) -> Result<()> {
        if key.kind == KeyKind::Primary {
            return Err(MigrationError::SchemaOperationFailed(format!(
                "Primary key on {} can only be declared when the table is created",
                table
            )));
        }

        tracing::debug!("Adding key {} on {}", key.name, table);
        let mut index = Index::create();
        index.name(&key.name).table(Alias::new(table));
        for column in &key.columns {
            index.col(Alias::new(column));
        }
        if key.kind == KeyKind::Unique {
            index.unique();
        }
        self.manager().create_index(index).await?;
        Ok(())
    }

    async fn drop_key(&self, table: &str, name: &str) -> Result<()> {
        if name == Key::PRIMARY {
            return Err(MigrationError::SchemaOperationFailed(format!(
                "Primary key on {} cannot be dropped in place; rebuild the table instead",
                table
            )));
        }

        tracing::debug!("Dropping key {} on {}", name, table);
        self.manager()
            .drop_index(Index::drop().name(name).table(Alias::new(table)).to_owned())
            .await?;
        Ok(())
    }

    async fn copy_rows(&self, from: &str, to: &str, columns: &[(String, String)]) -> Result<u64> {
        tracing::debug!("Copying {} columns from {} to {}", columns.len(), from, to);

        let mut select = Query::select();
        select.from(Alias::new(from));
        for (source, _) in columns {
            select.column(Alias::new(source));
        }

        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(to))
            .columns(columns.iter().map(|(_, target)| Alias::new(target)));
        insert.select_from(select)?;

        let result = self.db.execute(self.backend().build(&insert)).await?;
        Ok(result.rows_affected())
    }

    async fn sync_sequence(&self, table: &str, column: &str) -> Result<()> {
        match self.backend() {
            // AUTOINCREMENT already tracks explicit ids in sqlite_sequence
            DbBackend::Sqlite => Ok(()),
            DbBackend::Postgres => {
                let column = column.replace('"', "");
                let table_name = table.replace('"', "");
                self.query(format!(
                    "SELECT setval(pg_get_serial_sequence({}, {}), \
                     COALESCE(MAX(\"{}\"), 0) + 1, false) FROM \"{}\"",
                    quote_literal(&table_name),
                    quote_literal(&column),
                    column,
                    table_name
                ))
                .await?;
                tracing::debug!("Synced sequence of {}.{}", table_name, column);
                Ok(())
            }
            other => Err(MigrationError::SchemaOperationFailed(format!(
                "Unsupported database backend: {:?}",
                other
            ))),
        }
    }

    async fn execute_raw(&self, statement: &str) -> Result<u64> {
        tracing::debug!("Executing raw statement: {}", statement);
        Ok(self.db.execute_unprepared(statement).await?.rows_affected())
    }
}

#[async_trait]
impl RowOps for SeaStorage {
    async fn select_rows(
        &self,
        table: &str,
        columns: &[(&str, Kind)],
        filter: Option<Condition>,
    ) -> Result<Vec<Row>> {
        let mut select = Query::select();
        select.from(Alias::new(table));
        for (name, kind) in columns {
            select.expr_as(
                Func::cast_as(Expr::col(Alias::new(*name)), Alias::new(kind.cast_type())),
                Alias::new(*name),
            );
        }
        if let Some(filter) = filter {
            select.cond_where(filter);
        }
        for (name, _) in columns {
            select.order_by(Alias::new(*name), Order::Asc);
        }

        let results = self.db.query_all(self.backend().build(&select)).await?;

        results
            .iter()
            .map(|result| -> Result<Row> {
                let mut row = Row::new();
                for (name, kind) in columns {
                    let cell = match kind {
                        Kind::Int => result
                            .try_get::<Option<i64>>("", name)
                            .map(Cell::from),
                        Kind::Text => result
                            .try_get::<Option<String>>("", name)
                            .map(Cell::from),
                    }
                    .map_err(|e| {
                        MigrationError::RowTransformationFailed(format!(
                            "Failed to read {}.{}: {}",
                            table, name, e
                        ))
                    })?;
                    row.set(*name, cell);
                }
                Ok(row)
            })
            .collect()
    }

    async fn insert_batch(&self, table: &str, rows: Vec<Row>) -> Result<u64> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let columns: Vec<String> = first.columns().map(str::to_string).collect();

        let mut inserted = 0;
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table))
                .columns(columns.iter().map(Alias::new));

            for row in rows.by_ref().take(INSERT_CHUNK_ROWS) {
                if !row.columns().eq(columns.iter().map(String::as_str)) {
                    return Err(MigrationError::RowTransformationFailed(format!(
                        "Row for {} has columns {:?}, expected {:?}",
                        table,
                        row.columns().collect::<Vec<_>>(),
                        columns
                    )));
                }
                insert
                    .values(row.into_cells().into_values().map(Cell::into_expr))
                    .map_err(|e| {
                        MigrationError::RowTransformationFailed(format!(
                            "Failed to build insert into {}: {}",
                            table, e
                        ))
                    })?;
            }

            let result = self
                .db
                .execute(self.backend().build(&insert))
                .await
                .map_err(|e| {
                    MigrationError::RowTransformationFailed(format!(
                        "Batch insert into {} failed: {}",
                        table, e
                    ))
                })?;
            inserted += result.rows_affected();
        }

        tracing::debug!("Inserted {} rows into {}", inserted, table);
        Ok(inserted)
    }

    async fn update_rows(
        &self,
        table: &str,
        values: Vec<(String, Cell)>,
        filter: Condition,
    ) -> Result<u64> {
        let mut update = Query::update();
        update
            .table(Alias::new(table))
            .values(
                values
                    .into_iter()
                    .map(|(column, cell)| (Alias::new(column), cell.into_expr())),
            )
            .cond_where(filter);

        let result = self
            .db
            .execute(self.backend().build(&update))
            .await
            .map_err(|e| {
                MigrationError::RowTransformationFailed(format!(
                    "Update of {} failed: {}",
                    table, e
                ))
            })?;
        Ok(result.rows_affected())
    }
}
