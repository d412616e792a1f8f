use archive_common::error::{ArchiveError, Result};
use async_trait::async_trait;
use duckdb::Connection;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Analytical (column-oriented, scan-heavy) engine, backed by an embedded
/// DuckDB instance (spec §9's "OLAP engine (this workspace)"). DuckDB has
/// no async driver, so every call is dispatched to `spawn_blocking`,
/// matching the teacher's pattern of keeping blocking work off the async
/// reactor (`crates/storage/src/qdrant.rs`'s synchronous point inserts are
/// the closest analogue in the pack).
pub struct OlapEngine {
    conn: Arc<Mutex<Connection>>,
}

impl OlapEngine {
    pub fn open(path: &str) -> Result<Self> {
        info!(path, "opening OLAP engine");
        let conn = Connection::open(path).map_err(|e| ArchiveError::Io(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| ArchiveError::Io(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            guard.execute_batch(&sql)
        })
        .await
        .map_err(|e| ArchiveError::Io(e.to_string()))?
        .map_err(|e| ArchiveError::Io(e.to_string()))?;
        Ok(())
    }

    /// Run a read query, returning each row as a JSON object keyed by
    /// column name. Intended for C9's ad-hoc analytical SELECTs, not for
    /// hot-path row access.
    pub async fn query_rows(&self, sql: &str) -> Result<Vec<Value>> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || -> std::result::Result<Vec<Value>, duckdb::Error> {
            let guard = conn.blocking_lock();
            let mut stmt = guard.prepare(&sql)?;
            let column_names: Vec<String> = stmt.column_names();
            let rows = stmt.query_map([], |row| {
                let mut object = serde_json::Map::new();
                for (i, name) in column_names.iter().enumerate() {
                    let value: duckdb::types::Value = row.get(i)?;
                    object.insert(name.clone(), duckdb_value_to_json(value));
                }
                Ok(Value::Object(object))
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ArchiveError::Io(e.to_string()))?
        .map_err(|e| ArchiveError::Io(e.to_string()))
    }
}

/// Table names reach the sink from the sync consumer's own change-stream
/// event, never directly from a remote caller, but we validate anyway since
/// DuckDB gives no way to bind an identifier as a parameter.
fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ArchiveError::Config(format!("invalid OLAP table name: {table}")))
    }
}

fn duckdb_value_to_json(value: duckdb::types::Value) -> Value {
    use duckdb::types::Value as V;
    match value {
        V::Null => Value::Null,
        V::Boolean(b) => Value::Bool(b),
        V::TinyInt(n) => Value::from(n),
        V::SmallInt(n) => Value::from(n),
        V::Int(n) => Value::from(n),
        V::BigInt(n) => Value::from(n),
        V::Float(f) => Value::from(f),
        V::Double(f) => Value::from(f),
        V::Text(s) => Value::String(s),
        other => Value::String(format!("{other:?}")),
    }
}

/// Idempotent, last-writer-wins application of a dual-write event onto the
/// OLAP engine (spec §4.10). Expressed as a trait so `archive-sync` can be
/// tested against an in-memory fake without a real DuckDB file.
#[async_trait]
pub trait OlapSink: Send + Sync {
    async fn upsert(&self, table: &str, pk: &str, seq: i64, payload: &Value, committed_at: &str) -> Result<()>;
    async fn tombstone(&self, table: &str, pk: &str, seq: i64, committed_at: &str) -> Result<()>;
}

#[async_trait]
impl OlapSink for OlapEngine {
    async fn upsert(&self, table: &str, pk: &str, seq: i64, payload: &Value, committed_at: &str) -> Result<()> {
        validate_table_name(table)?;
        // `target.seq < event.seq` makes re-application of an
        // already-applied (or out-of-order, already-superseded) event a
        // no-op rather than a regression.
        let sql = format!(
            "INSERT INTO {table} (pk, seq, payload, committed_at, deleted) \
             VALUES (?, ?, ?, ?, false) \
             ON CONFLICT (pk) DO UPDATE SET \
               seq = excluded.seq, payload = excluded.payload, \
               committed_at = excluded.committed_at, deleted = false \
             WHERE {table}.seq < excluded.seq"
        );
        let pk = pk.to_string();
        let payload = payload.to_string();
        let committed_at = committed_at.to_string();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            guard.execute(&sql, duckdb::params![pk, seq, payload, committed_at])
        })
        .await
        .map_err(|e| ArchiveError::Io(e.to_string()))?
        .map_err(|e| ArchiveError::Io(e.to_string()))?;
        Ok(())
    }

    async fn tombstone(&self, table: &str, pk: &str, seq: i64, committed_at: &str) -> Result<()> {
        validate_table_name(table)?;
        let sql = format!(
            "INSERT INTO {table} (pk, seq, payload, committed_at, deleted) \
             VALUES (?, ?, 'null', ?, true) \
             ON CONFLICT (pk) DO UPDATE SET \
               seq = excluded.seq, committed_at = excluded.committed_at, deleted = true \
             WHERE {table}.seq < excluded.seq"
        );
        let pk = pk.to_string();
        let committed_at = committed_at.to_string();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            guard.execute(&sql, duckdb::params![pk, seq, committed_at])
        })
        .await
        .map_err(|e| ArchiveError::Io(e.to_string()))?
        .map_err(|e| ArchiveError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_engine() -> OlapEngine {
        let engine = OlapEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE captures (pk VARCHAR PRIMARY KEY, seq BIGINT, payload VARCHAR, committed_at VARCHAR, deleted BOOLEAN)",
            )
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let engine = seeded_engine().await;
        engine
            .upsert("captures", "url1", 1, &serde_json::json!({"status": 200}), "2026-01-01T00:00:00Z")
            .await
            .unwrap();
        let rows = engine.query_rows("SELECT * FROM captures").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn stale_seq_upsert_is_a_no_op() {
        let engine = seeded_engine().await;
        engine
            .upsert("captures", "url1", 5, &serde_json::json!({"status": 200}), "2026-01-01T00:00:00Z")
            .await
            .unwrap();
        engine
            .upsert("captures", "url1", 2, &serde_json::json!({"status": 404}), "2026-01-01T00:00:01Z")
            .await
            .unwrap();
        let rows = engine.query_rows("SELECT * FROM captures WHERE pk = 'url1'").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["seq"], Value::from(5));
    }

    #[tokio::test]
    async fn pk_containing_a_quote_does_not_break_the_statement() {
        let engine = seeded_engine().await;
        engine
            .upsert(
                "captures",
                "https://example.com/it's-a-test",
                1,
                &serde_json::json!({"status": 200}),
                "2026-01-01T00:00:00Z",
            )
            .await
            .unwrap();
        let rows = engine.query_rows("SELECT * FROM captures").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["pk"], Value::String("https://example.com/it's-a-test".to_string()));
    }

    #[tokio::test]
    async fn invalid_table_name_is_rejected_before_reaching_sql() {
        let engine = seeded_engine().await;
        let result = engine
            .upsert(
                "captures; DROP TABLE captures --",
                "url1",
                1,
                &serde_json::json!({"status": 200}),
                "2026-01-01T00:00:00Z",
            )
            .await;
        assert!(matches!(result, Err(ArchiveError::Config(_))));
    }
}
