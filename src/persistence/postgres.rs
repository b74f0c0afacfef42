//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::RecordTable;
use super::models::Record;
use crate::config::validate_table_name;
use crate::error::{StorageError, StorageResult};

/// SQLSTATE `duplicate_table`.
const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// Catalog index two concurrent `CREATE TABLE`s collide on.
const PG_TYPE_INDEX: &str = "pg_type_typname_nsp_index";

/// PostgreSQL-backed record table using `sqlx::PgPool`.
///
/// The table name is validated once at construction and the statements
/// that embed it are rendered up front; ids and payloads are always bound
/// as parameters.
#[derive(Debug, Clone)]
pub struct PgRecordTable {
    pool: PgPool,
    table: String,
    sql: Statements,
}

#[derive(Debug, Clone)]
struct Statements {
    create: String,
    drop: String,
    select_all: String,
    select_one: String,
    exists: String,
    insert: String,
    delete: String,
    count: String,
}

impl Statements {
    fn render(table: &str) -> Self {
        Self {
            create: format!("CREATE TABLE {table} (id text PRIMARY KEY, data jsonb NOT NULL)"),
            drop: format!("DROP TABLE {table}"),
            select_all: format!("SELECT id, data FROM {table}"),
            select_one: format!("SELECT data FROM {table} WHERE id = $1"),
            exists: format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)"),
            insert: format!(
                "INSERT INTO {table} (id, data) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING"
            ),
            delete: format!("DELETE FROM {table} WHERE id = $1"),
            count: format!("SELECT COUNT(*) FROM {table}"),
        }
    }
}

impl PgRecordTable {
    /// Creates a record table over the given connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if `table` is not a plain
    /// lower-case identifier.
    pub fn new(pool: PgPool, table: &str) -> StorageResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            sql: Statements::render(table),
        })
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordTable for PgRecordTable {
    fn name(&self) -> &str {
        &self.table
    }

    fn concurrency_limit(&self) -> usize {
        let max = self.pool.options().get_max_connections();
        usize::try_from(max).unwrap_or(1).max(1)
    }

    async fn table_exists(&self) -> StorageResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_tables WHERE tablename = $1)",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_table(&self) -> StorageResult<()> {
        sqlx::query(&self.sql.create)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_schema_race(&e) {
                    StorageError::SchemaRace(self.table.clone())
                } else {
                    StorageError::Connectivity(e.to_string())
                }
            })?;

        Ok(())
    }

    async fn drop_table(&self) -> StorageResult<()> {
        sqlx::query(&self.sql.drop).execute(&self.pool).await?;
        Ok(())
    }

    async fn select_all(&self) -> StorageResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, (String, Value)>(&self.sql.select_all)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn select_one(&self, id: &str) -> StorageResult<Option<Value>> {
        let data = sqlx::query_scalar::<_, Value>(&self.sql.select_one)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(data)
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(&self.sql.exists)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn insert_if_absent(&self, id: &str, data: &Value) -> StorageResult<bool> {
        let result = sqlx::query(&self.sql.insert)
            .bind(id)
            .bind(data)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: &str) -> StorageResult<u64> {
        let result = sqlx::query(&self.sql.delete)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> StorageResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(&self.sql.count)
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Returns `true` when a `CREATE TABLE` failed only because another
/// initializer created the table first.
fn is_schema_race(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    match db.code().as_deref() {
        Some(DUPLICATE_TABLE) => true,
        Some(UNIQUE_VIOLATION) => db.constraint() == Some(PG_TYPE_INDEX),
        _ => db.message().contains("already exists"),
    }
}
