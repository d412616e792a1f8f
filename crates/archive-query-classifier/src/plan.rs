use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an analytical request (spec §4.8, §3 `QueryPlan`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    UserAuth,
    ProjectCrud,
    PageManagement,
    RealTime,
    Analytics,
    TimeSeries,
    Aggregation,
    Reporting,
    BulkRead,
    Hybrid,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Estimated execution cost tier, ordered for threshold comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which engine a plan should execute against (spec §4.9 consumes this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Target {
    Oltp,
    Olap,
    Hybrid,
}

/// Advisory rewrite suggestions; the classifier never rewrites SQL itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationHint {
    AddLimit,
    PushdownPredicate,
    SubqueryToJoin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub query_type: QueryType,
    pub complexity: Complexity,
    pub est_rows: u64,
    pub est_memory_mb: u64,
    pub est_duration_ms: u64,
    pub target: Target,
    pub optimization_hints: Vec<OptimizationHint>,
    /// Tables referenced, used by C9's cache-invalidation dependency set.
    pub tables: Vec<String>,
    pub is_mutating: bool,
}

impl QueryPlan {
    /// `USER_AUTH` and any mutating plan must never be served from cache
    /// (spec §8 testable property), regardless of what the caller requested.
    pub fn forces_cache_disabled(&self) -> bool {
        self.is_mutating || matches!(self.query_type, QueryType::UserAuth)
    }
}
