use archive_common::config::PoolConfig;
use archive_common::error::{ArchiveError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column, PgPool, Row};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Transactional (row-oriented) engine, backed by PostgreSQL (spec §9's
/// "OLTP engine (this workspace)"). Thin wrapper following
/// `PostgresClient` in the teacher's `storage` crate, extended with the
/// pool-policy knobs C9 requires (§4.9's `{max_connections, idle_timeout,
/// max_lifetime, health_check_interval}`).
pub struct OltpPool {
    pool: PgPool,
}

impl OltpPool {
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self> {
        info!(max_conn = config.max_conn, "connecting OLTP pool");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_conn)
            .idle_timeout(Duration::from_secs(config.idle_timeout_s))
            .max_lifetime(Duration::from_secs(config.max_lifetime_s))
            .connect(database_url)
            .await
            .map_err(|e| ArchiveError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ArchiveError::UpstreamUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Current in-use + idle connection count, exposed for the router's
    /// least-in-flight pool-selection policy (spec §4.9).
    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    pub fn idle(&self) -> usize {
        self.pool.num_idle()
    }

    /// Run a read query, returning each row as a JSON object keyed by
    /// column name. Column values are decoded opportunistically (`i64`,
    /// `f64`, `bool`, then `String`) since the caller's SQL is arbitrary
    /// and not known at compile time.
    pub async fn query_rows(&self, sql: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArchiveError::Transient(e.to_string()))?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Run a mutating statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| ArchiveError::Transient(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    let mut object = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let index = column.ordinal();
        let value = row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .or_else(|_| row.try_get::<f64, _>(index).map(|v| Value::from(v)))
            .or_else(|_| row.try_get::<bool, _>(index).map(Value::from))
            .or_else(|_| row.try_get::<String, _>(index).map(Value::from))
            .unwrap_or(Value::Null);
        object.insert(name, value);
    }
    Value::Object(object)
}
