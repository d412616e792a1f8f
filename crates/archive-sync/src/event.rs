use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    Insert,
    Update,
    Delete,
}

/// One row-level mutation from the OLTP change stream (spec §3, §4.10).
/// `seq` is globally monotonically increasing and defines replay order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub seq: i64,
    pub table: String,
    pub pk: String,
    pub op: Op,
    pub after_image: Option<Value>,
    pub committed_at: DateTime<Utc>,
}

impl SyncEvent {
    pub fn is_tombstone(&self) -> bool {
        matches!(self.op, Op::Delete)
    }
}
