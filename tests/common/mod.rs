//! Test helpers: a small legacy install to migrate, plus dump and count
//! helpers for comparing databases.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sea_orm::sea_query::Condition;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use serde_json::json;

use schemashift::config::InstallConfig;
use schemashift::error::{MigrationError, Result};
use schemashift::migrations::progress::ProgressLog;
use schemashift::migrations::runner::{RunReport, Runner};
use schemashift::migrations::MigrationPlan;
use schemashift::models::permission::LEGACY_PERMISSIONS;
use schemashift::models::php_value;
use schemashift::models::site_preferences::{
    CHANNEL_PREFERENCES, MEMBER_PREFERENCES, SYSTEM_PREFERENCES, TEMPLATE_PREFERENCES,
};
use schemashift::services::rows::{Cell, Kind, Row, RowOps};
use schemashift::services::schema::{ColumnInfo, Field, Key, SchemaOps};
use schemashift::services::storage::SeaStorage;

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> DatabaseConnection {
    schemashift::db::connect_with_url("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

pub async fn create_test_storage() -> SeaStorage {
    SeaStorage::new(create_test_db().await)
}

/// A storage holding the legacy install described by [`seed_legacy_install`]
pub async fn create_legacy_storage() -> SeaStorage {
    let storage = create_test_storage().await;
    seed_legacy_install(&storage).await;
    storage
}

/// Install-time settings seeded as global config rows
pub fn install_config() -> InstallConfig {
    let mut values = BTreeMap::new();
    values.insert("site_url".to_string(), "https://example.com/".to_string());
    values.insert("is_system_on".to_string(), "y".to_string());
    values.insert("debug".to_string(), "0".to_string());
    values.insert("cookie_domain".to_string(), String::new());
    InstallConfig::new(values)
}

/// A legacy preference blob: base64 of the PHP-serialized array
pub fn blob(value: serde_json::Value) -> String {
    STANDARD.encode(php_value::to_string(&value))
}

/// A preference blob holding a JSON object
pub fn json_blob(value: serde_json::Value) -> String {
    STANDARD.encode(value.to_string())
}

async fn create(storage: &SeaStorage, table: &str, fields: &[Field], keys: &[Key]) {
    storage
        .create_table(table, fields, keys)
        .await
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", table, e));
}

async fn insert(storage: &SeaStorage, table: &str, rows: Vec<Row>) {
    storage
        .insert_batch(table, rows)
        .await
        .unwrap_or_else(|e| panic!("Failed to seed {}: {}", table, e));
}

/// Pairs table `(a, b)` with a composite primary key
async fn pivot(storage: &SeaStorage, table: &str, a: &str, b: &str, pairs: &[(i64, i64)]) {
    create(
        storage,
        table,
        &[Field::int(a), Field::int(b)],
        &[Key::primary(&[a, b])],
    )
    .await;
    insert(
        storage,
        table,
        pairs
            .iter()
            .map(|(x, y)| Row::new().with(a, *x).with(b, *y))
            .collect(),
    )
    .await;
}

fn group(group_id: i64, site_id: i64, title: &str, granted: &[&str]) -> Row {
    let mut row = Row::new()
        .with("group_id", group_id)
        .with("site_id", site_id)
        .with("group_title", title)
        .with("group_description", None::<String>)
        .with("is_locked", "n");
    for flag in LEGACY_PERMISSIONS {
        let value = if granted.contains(flag) { "y" } else { "n" };
        row.set(*flag, value);
    }
    row
}

/// Legacy fixture:
///
/// - site 1 groups 1-7 (1 super admin, 2 banned, 3 guests, 4 pending,
///   5 members, 6 editors, 7 authors) and site 2 groups 1, 5
/// - statuses 100, 200 with 100 denied to group 6
/// - templates 10, 20, 30 with 10 denied to 3, 20 denied to 6 and 7
/// - upload destinations 1, 2 (user) and 3 (add-on) with 1 denied to 5
pub async fn seed_legacy_install(storage: &SeaStorage) {
    // Sites and their preference blobs
    create(
        storage,
        "sites",
        &[
            Field::int("site_id"),
            Field::varchar("site_label", 100),
            Field::text(CHANNEL_PREFERENCES).nullable(),
            Field::text(MEMBER_PREFERENCES).nullable(),
            Field::text(SYSTEM_PREFERENCES).nullable(),
            Field::text(TEMPLATE_PREFERENCES).nullable(),
        ],
        &[Key::primary(&["site_id"])],
    )
    .await;
    insert(
        storage,
        "sites",
        vec![
            Row::new()
                .with("site_id", 1)
                .with("site_label", "Main")
                .with(
                    CHANNEL_PREFERENCES,
                    blob(json!({"channel_nomenclature": "channel", "auto_convert_high_ascii": "n"})),
                )
                .with(
                    MEMBER_PREFERENCES,
                    blob(json!({
                        "default_member_group": 5,
                        "allow_member_registration": "y",
                        "date_format": "%m/%d"
                    })),
                )
                .with(
                    SYSTEM_PREFERENCES,
                    blob(json!({
                        "date_format": "%n/%j/%y",
                        "site_name": "Main",
                        "is_site_on": "y",
                        "cp_theme": null
                    })),
                )
                .with(
                    TEMPLATE_PREFERENCES,
                    blob(json!({"strict_urls": "y", "save_tmpl_files": ["a", "b"]})),
                ),
            Row::new()
                .with("site_id", 2)
                .with("site_label", "Second")
                .with(CHANNEL_PREFERENCES, None::<String>)
                .with(MEMBER_PREFERENCES, blob(json!({"default_member_group": 6})))
                .with(
                    SYSTEM_PREFERENCES,
                    json_blob(json!({"site_name": "Second", "date_format": "%j-%n-%y"})),
                )
                .with(TEMPLATE_PREFERENCES, ""),
        ],
    )
    .await;

    // Member groups with every legacy permission flag
    let mut fields = vec![
        Field::int("group_id"),
        Field::int("site_id"),
        Field::varchar("group_title", 100),
        Field::text("group_description").nullable(),
        Field::char("is_locked", 1).default("n"),
    ];
    fields.extend(
        LEGACY_PERMISSIONS
            .iter()
            .map(|flag| Field::char(*flag, 1).default("n")),
    );
    create(
        storage,
        "member_groups",
        &fields,
        &[Key::primary(&["group_id", "site_id"])],
    )
    .await;
    insert(
        storage,
        "member_groups",
        vec![
            group(1, 1, "Super Admin", LEGACY_PERMISSIONS),
            group(2, 1, "Banned", &[]),
            group(3, 1, "Guests", &["can_search"]),
            group(4, 1, "Pending", &[]),
            group(
                5,
                1,
                "Members",
                &["can_search", "can_admin_mbr_groups", "can_send_private_messages"],
            ),
            group(6, 1, "Editors", &["can_access_cp", "can_edit_member_groups"]),
            group(7, 1, "Authors", &[]),
            group(1, 2, "Super Admin", &[]),
            group(5, 2, "Members", &["can_search"]),
        ],
    )
    .await;

    create(
        storage,
        "members",
        &[
            Field::int("member_id").auto_increment(),
            Field::int("group_id"),
            Field::varchar("username", 75),
            Field::varchar("date_format", 8).default("%n/%j/%Y"),
        ],
        &[
            Key::primary(&["member_id"]),
            Key::index("members_group_id", &["group_id"]),
        ],
    )
    .await;
    insert(
        storage,
        "members",
        [
            (1, 1, "admin", "%Y-%m-%d"),
            (2, 5, "alice", "%n/%j/%y"),
            (3, 6, "bob", "%j-%n-%y"),
            (4, 6, "carol", "%n/%j/%Y"),
            (5, 7, "dave", "%Y-%m-%d"),
        ]
        .into_iter()
        .map(|(id, group_id, name, format)| {
            Row::new()
                .with("member_id", id as i64)
                .with("group_id", group_id as i64)
                .with("username", name)
                .with("date_format", format)
        })
        .collect(),
    )
    .await;

    // Group pivots that get renamed
    pivot(storage, "channel_member_groups", "group_id", "channel_id", &[(5, 1), (6, 1), (6, 2)]).await;
    pivot(storage, "module_member_groups", "group_id", "module_id", &[(5, 3), (6, 3)]).await;
    pivot(storage, "template_member_groups", "group_id", "template_group_id", &[(6, 1)]).await;
    pivot(storage, "layout_publish_member_groups", "group_id", "layout_id", &[(6, 1), (7, 1)]).await;

    create(
        storage,
        "email_cache_mg",
        &[Field::int("cache_id"), Field::int("group_id")],
        &[Key::primary(&["cache_id", "group_id"])],
    )
    .await;
    insert(
        storage,
        "email_cache_mg",
        vec![
            Row::new().with("cache_id", 1).with("group_id", 5),
            Row::new().with("cache_id", 1).with("group_id", 6),
        ],
    )
    .await;

    // Deny lists and their entities
    create(
        storage,
        "statuses",
        &[Field::int("status_id").auto_increment(), Field::varchar("status", 50)],
        &[Key::primary(&["status_id"])],
    )
    .await;
    insert(
        storage,
        "statuses",
        vec![
            Row::new().with("status_id", 100).with("status", "open"),
            Row::new().with("status_id", 200).with("status", "closed"),
        ],
    )
    .await;
    pivot(storage, "status_no_access", "status_id", "member_group", &[(100, 6)]).await;

    create(
        storage,
        "templates",
        &[Field::int("template_id").auto_increment(), Field::varchar("template_name", 50)],
        &[Key::primary(&["template_id"])],
    )
    .await;
    insert(
        storage,
        "templates",
        [(10, "index"), (20, "about"), (30, "contact")]
            .into_iter()
            .map(|(id, name)| Row::new().with("template_id", id as i64).with("template_name", name))
            .collect(),
    )
    .await;
    pivot(
        storage,
        "template_no_access",
        "template_id",
        "member_group",
        &[(10, 3), (20, 6), (20, 7)],
    )
    .await;

    create(
        storage,
        "upload_prefs",
        &[
            Field::int("id").auto_increment(),
            Field::int("module_id").default(0),
            Field::varchar("name", 50),
        ],
        &[Key::primary(&["id"])],
    )
    .await;
    insert(
        storage,
        "upload_prefs",
        [(1, 0, "Images"), (2, 0, "Documents"), (3, 12, "Add-on files")]
            .into_iter()
            .map(|(id, module_id, name)| {
                Row::new()
                    .with("id", id as i64)
                    .with("module_id", module_id as i64)
                    .with("name", name)
            })
            .collect(),
    )
    .await;
    pivot(storage, "upload_no_access", "upload_id", "member_group", &[(1, 5), (3, 6)]).await;

    // Tables only the 2.10.0 update touches
    create(
        storage,
        "sessions",
        &[Field::varchar("session_id", 40), Field::int("member_id")],
        &[Key::primary(&["session_id"])],
    )
    .await;
    insert(
        storage,
        "sessions",
        vec![Row::new().with("session_id", "abc").with("member_id", 2)],
    )
    .await;

    create(
        storage,
        "category_fields",
        &[Field::int("field_id").auto_increment(), Field::varchar("field_name", 32)],
        &[Key::primary(&["field_id"])],
    )
    .await;
    insert(
        storage,
        "category_fields",
        [(1, "summary"), (2, "image"), (3, "removed")]
            .into_iter()
            .map(|(id, name)| Row::new().with("field_id", id as i64).with("field_name", name))
            .collect(),
    )
    .await;
    create(
        storage,
        "category_field_data",
        &[
            Field::int("cat_id"),
            Field::int("site_id"),
            Field::text("field_id_1"),
            Field::text("field_id_2").nullable(),
        ],
        &[Key::primary(&["cat_id"])],
    )
    .await;
    insert(
        storage,
        "category_field_data",
        vec![Row::new()
            .with("cat_id", 1)
            .with("site_id", 1)
            .with("field_id_1", "Summary text")
            .with("field_id_2", None::<String>)],
    )
    .await;
}

/// Run `plan` against `storage`, recording progress
pub async fn run_plan(
    storage: &dyn schemashift::services::storage::Storage,
    plan: &MigrationPlan,
) -> (Result<RunReport>, ProgressLog) {
    let install = install_config();
    let log = ProgressLog::new();
    let result = Runner::new(storage, &install, &log).run(plan).await;
    (result, log)
}

/// Keep only the first `count` steps of `plan`
pub fn prefix(mut plan: MigrationPlan, count: usize) -> MigrationPlan {
    plan.steps.truncate(count);
    plan
}

pub async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT COUNT(*) AS n FROM \"{}\"", table),
        ))
        .await
        .unwrap_or_else(|e| panic!("Failed to count {}: {}", table, e))
        .expect("COUNT(*) returns a row");
    row.try_get::<i64>("", "n").expect("count column")
}

/// Count rows of `table` grouped by one integer column
pub async fn count_by(storage: &SeaStorage, table: &str, column: &str) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for row in storage
        .select_rows(table, &[(column, Kind::Int)], None)
        .await
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", table, e))
    {
        *counts.entry(row.int(column).unwrap()).or_insert(0) += 1;
    }
    counts
}

pub async fn table_names(db: &DatabaseConnection) -> Vec<String> {
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => {
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name"
        }
        _ => {
            "SELECT table_name::text AS name FROM information_schema.tables \
             WHERE table_schema = current_schema() ORDER BY table_name"
        }
    };
    db.query_all(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await
        .expect("Failed to list tables")
        .iter()
        .map(|row| row.try_get::<String>("", "name").expect("table name"))
        .collect()
}

/// Every table with its columns and its rows rendered as text
pub type Dump = Vec<(String, Vec<ColumnInfo>, Vec<Row>)>;

pub async fn dump(storage: &SeaStorage) -> Dump {
    let mut dump = Vec::new();
    for table in table_names(storage.connection()).await {
        let columns = storage.columns(&table).await.expect("Failed to read columns");
        let select: Vec<(&str, Kind)> = columns
            .iter()
            .map(|c| (c.name.as_str(), Kind::Text))
            .collect();
        let rows = storage
            .select_rows(&table, &select, None)
            .await
            .expect("Failed to dump rows");
        dump.push((table, columns, rows));
    }
    dump
}

/// Storage that fails inserts into one table while armed
pub struct FailingInserts {
    pub inner: SeaStorage,
    pub table: &'static str,
    pub armed: AtomicBool,
}

impl FailingInserts {
    pub fn new(inner: SeaStorage, table: &'static str) -> Self {
        Self {
            inner,
            table,
            armed: AtomicBool::new(true),
        }
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl SchemaOps for FailingInserts {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        self.inner.table_exists(table).await
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        self.inner.column_exists(table, column).await
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.inner.columns(table).await
    }

    async fn create_table(&self, table: &str, fields: &[Field], keys: &[Key]) -> Result<()> {
        self.inner.create_table(table, fields, keys).await
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.inner.drop_table(table).await
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        self.inner.rename_table(from, to).await
    }

    async fn add_column(&self, table: &str, field: &Field) -> Result<()> {
        self.inner.add_column(table, field).await
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        self.inner.drop_column(table, column).await
    }

    async fn modify_column(&self, table: &str, old_name: &str, field: &Field) -> Result<()> {
        self.inner.modify_column(table, old_name, field).await
    }

    async fn add_key(&self, table: &str, key: &Key) -> Result<()> {
        self.inner.add_key(table, key).await
    }

    async fn drop_key(&self, table: &str, name: &str) -> Result<()> {
        self.inner.drop_key(table, name).await
    }

    async fn copy_rows(&self, from: &str, to: &str, columns: &[(String, String)]) -> Result<u64> {
        if self.armed.load(Ordering::SeqCst) && to == self.table {
            return Err(MigrationError::SchemaOperationFailed(format!(
                "injected copy failure into {}",
                to
            )));
        }
        self.inner.copy_rows(from, to, columns).await
    }

    async fn sync_sequence(&self, table: &str, column: &str) -> Result<()> {
        self.inner.sync_sequence(table, column).await
    }

    async fn execute_raw(&self, statement: &str) -> Result<u64> {
        self.inner.execute_raw(statement).await
    }
}

#[async_trait]
impl RowOps for FailingInserts {
    async fn select_rows(
        &self,
        table: &str,
        columns: &[(&str, Kind)],
        filter: Option<Condition>,
    ) -> Result<Vec<Row>> {
        self.inner.select_rows(table, columns, filter).await
    }

    async fn insert_batch(&self, table: &str, rows: Vec<Row>) -> Result<u64> {
        if self.armed.load(Ordering::SeqCst) && table == self.table {
            return Err(MigrationError::RowTransformationFailed(format!(
                "injected insert failure into {}",
                table
            )));
        }
        self.inner.insert_batch(table, rows).await
    }

    async fn update_rows(
        &self,
        table: &str,
        values: Vec<(String, Cell)>,
        filter: Condition,
    ) -> Result<u64> {
        self.inner.update_rows(table, values, filter).await
    }
}
