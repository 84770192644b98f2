use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::types::Json;
use serde_json::{Map, Value};
use sqlx::{Row, Transaction};

use super::{BatchTransaction, CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{IndexRecord, SearchHit, VectorColumn, VectorStoreConfig};

const ROW_SAVEPOINT: &str = "index_row";
const QUERY_CANCELED: &str = "57014";

/// PostgreSQL store writing to a `(key, vector, metadata, created_at)` table.
///
/// `connect` holds a single connection: an indexing run owns its connection
/// for its whole lifetime. `connect_with` sizes the pool for request handlers.
pub struct PgVectorStore {
    pool: PgPool,
    schema: Option<String>,
    table: String,
    table_name: String,
    upsert_sql: String,
    search_sql: String,
    vector_column: VectorColumn,
}

impl PgVectorStore {
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        Self::connect_with(config, 1).await
    }

    pub async fn connect_with(
        config: &VectorStoreConfig,
        max_connections: u32,
    ) -> Result<Self, VectorStoreError> {
        validate_identifier(&config.table)?;
        if let Some(ref schema) = config.schema {
            validate_identifier(schema)?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs.into()))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        let table_name = config.qualified_table_name();
        Ok(Self {
            pool,
            schema: config.schema.clone(),
            table: config.table.clone(),
            upsert_sql: upsert_sql(&table_name),
            search_sql: search_sql(&table_name, config.vector_column),
            table_name,
            vector_column: config.vector_column,
        })
    }
}

fn upsert_sql(table_name: &str) -> String {
    // created_at is left to the column default and never touched on update
    format!(
        "INSERT INTO {} (key, vector, metadata) VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET vector = EXCLUDED.vector, metadata = EXCLUDED.metadata",
        table_name
    )
}

/// Cosine-distance query. `FLOAT8[]` columns are cast to pgvector's `vector`.
fn search_sql(table_name: &str, vector_column: VectorColumn) -> String {
    let column = match vector_column {
        VectorColumn::Float8 => "vector::vector",
        VectorColumn::Pgvector => "vector",
    };
    format!(
        "SELECT key, ({column} <=> $1) AS distance, metadata FROM {table} \
         WHERE ({column} <=> $1) <= $2 \
         ORDER BY distance ASC \
         LIMIT $3",
        column = column,
        table = table_name
    )
}

fn validate_identifier(name: &str) -> Result<(), VectorStoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(VectorStoreError::InvalidTableName(name.to_string()))
    }
}

/// Returns true when a failed statement only affects its own row.
fn is_row_level(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => is_row_level_sqlstate(db_err.code().as_deref()),
        sqlx::Error::Encode(_) => true,
        _ => false,
    }
}

/// SQLSTATE classes 08 (connection), 25 (transaction state), 53 (resources),
/// 57 (operator intervention) and 58 (system) compromise the transaction.
/// `57014` is a statement cancelled by `statement_timeout` and stays row-level.
fn is_row_level_sqlstate(code: Option<&str>) -> bool {
    match code {
        Some(QUERY_CANCELED) => true,
        Some(code) => !matches!(code.get(..2), Some("08" | "25" | "53" | "57" | "58")),
        None => true,
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::Connection(e.to_string()))
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let table_exists: Option<(String,)> = sqlx::query_as(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_name = $1 AND table_schema = COALESCE($2, current_schema())",
        )
        .bind(&self.table)
        .bind(&self.schema)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VectorStoreError::Postgres(e.to_string()))?;

        if table_exists.is_none() {
            return Ok(None);
        }

        let query = format!("SELECT COUNT(*) AS count FROM {}", self.table_name);
        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Postgres(e.to_string()))?;
        let count: i64 = row.get("count");

        Ok(Some(CollectionInfo {
            records_count: count as u64,
        }))
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let max_distance = 1.0 - f64::from(threshold);
        let rows = sqlx::query(&self.search_sql)
            .bind(Vector::from(query.to_vec()))
            .bind(max_distance)
            .bind(top_k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Postgres(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let distance: f64 = row
                    .try_get("distance")
                    .map_err(|e| VectorStoreError::Postgres(e.to_string()))?;
                let metadata: Option<Json<Map<String, Value>>> = row
                    .try_get("metadata")
                    .map_err(|e| VectorStoreError::Postgres(e.to_string()))?;
                Ok(SearchHit {
                    key: row
                        .try_get("key")
                        .map_err(|e| VectorStoreError::Postgres(e.to_string()))?,
                    similarity: (1.0 - distance) as f32,
                    metadata: metadata.map(|m| m.0).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn begin_batch(&self) -> Result<Box<dyn BatchTransaction>, VectorStoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        Ok(Box::new(PgBatch {
            tx,
            upsert_sql: self.upsert_sql.clone(),
            vector_column: self.vector_column,
        }))
    }
}

/// One batch transaction. Each row runs inside its own savepoint so a
/// failing statement does not abort the enclosing transaction.
struct PgBatch {
    tx: Transaction<'static, Postgres>,
    upsert_sql: String,
    vector_column: VectorColumn,
}

impl PgBatch {
    async fn savepoint(&mut self, statement: &str) -> Result<(), VectorStoreError> {
        sqlx::query(&format!("{} {}", statement, ROW_SAVEPOINT))
            .execute(&mut *self.tx)
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl BatchTransaction for PgBatch {
    async fn upsert(&mut self, record: &IndexRecord) -> Result<(), VectorStoreError> {
        self.savepoint("SAVEPOINT").await?;

        let query = sqlx::query(&self.upsert_sql).bind(&record.key);
        let query = match self.vector_column {
            VectorColumn::Float8 => query.bind(record.vector_f64()),
            VectorColumn::Pgvector => query.bind(Vector::from(record.vector.clone())),
        };
        let result = query
            .bind(Json(&record.metadata))
            .execute(&mut *self.tx)
            .await;

        match result {
            Ok(_) => self.savepoint("RELEASE SAVEPOINT").await,
            Err(e) if is_row_level(&e) => {
                self.savepoint("ROLLBACK TO SAVEPOINT").await?;
                Err(VectorStoreError::RowWrite {
                    key: record.key.clone(),
                    message: e.to_string(),
                })
            }
            Err(e) => Err(VectorStoreError::Connection(e.to_string())),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), VectorStoreError> {
        let batch = *self;
        batch
            .tx
            .commit()
            .await
            .map_err(|e| VectorStoreError::Commit(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<(), VectorStoreError> {
        let batch = *self;
        batch
            .tx
            .rollback()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_sql_keeps_created_at() {
        let sql = upsert_sql("search.embeddings");
        assert!(sql.starts_with("INSERT INTO search.embeddings (key, vector, metadata)"));
        assert!(sql.contains("ON CONFLICT (key) DO UPDATE"));
        assert!(!sql.contains("created_at"));
    }

    #[test]
    fn test_search_sql_casts_float8_column() {
        let sql = search_sql("embeddings", VectorColumn::Float8);
        assert!(sql.contains("(vector::vector <=> $1) AS distance"));
        assert!(sql.contains("<= $2"));
        assert!(sql.contains("ORDER BY distance ASC"));
        assert!(sql.ends_with("LIMIT $3"));
    }

    #[test]
    fn test_search_sql_uses_native_vector_column() {
        let sql = search_sql("search.embeddings", VectorColumn::Pgvector);
        assert!(sql.contains("(vector <=> $1) AS distance"));
        assert!(sql.contains("FROM search.embeddings"));
        assert!(!sql.contains("::vector"));
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("embeddings").is_ok());
        assert!(validate_identifier("_v2_embeddings").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("embeddings; DROP TABLE x").is_err());
        assert!(validate_identifier("public.embeddings").is_err());
    }

    #[test]
    fn test_transport_errors_are_not_row_level() {
        assert!(!is_row_level(&sqlx::Error::PoolTimedOut));
        assert!(!is_row_level(&sqlx::Error::PoolClosed));
        assert!(!is_row_level(&sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer"
        ))));
    }

    #[test]
    fn test_sqlstate_classification() {
        assert!(is_row_level_sqlstate(Some("23505")));
        assert!(is_row_level_sqlstate(Some("22001")));
        assert!(is_row_level_sqlstate(None));
        assert!(!is_row_level_sqlstate(Some("08006")));
        assert!(!is_row_level_sqlstate(Some("25P02")));
        assert!(!is_row_level_sqlstate(Some("57P01")));
    }

    #[test]
    fn test_statement_timeout_is_row_level() {
        assert!(is_row_level_sqlstate(Some("57014")));
    }

    #[test]
    fn test_encode_errors_are_row_level() {
        let err = sqlx::Error::Encode("bad value".into());
        assert!(is_row_level(&err));
    }
}
