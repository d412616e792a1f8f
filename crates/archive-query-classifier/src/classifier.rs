use crate::plan::{Complexity, OptimizationHint, QueryPlan, QueryType, Target};
use crate::stats::TableStatsCache;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Static table membership and cost thresholds the classifier needs but
/// cannot infer from SQL text alone (spec §4.8's "OLAP threshold",
/// "OLTP-only"/"OLAP-only" table membership).
#[derive(Debug, Clone)]
pub struct ClassifierContext {
    pub oltp_only_tables: HashSet<String>,
    pub olap_only_tables: HashSet<String>,
    pub olap_row_threshold: u64,
    pub large_result_threshold: u64,
}

impl Default for ClassifierContext {
    fn default() -> Self {
        Self {
            oltp_only_tables: HashSet::new(),
            olap_only_tables: HashSet::new(),
            olap_row_threshold: 100_000,
            large_result_threshold: 10_000,
        }
    }
}

fn table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:from|join)\s+([a-z_][a-z0-9_]*)").unwrap())
}
fn update_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bupdate\s+([a-z_][a-z0-9_]*)").unwrap())
}
fn insert_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\binsert\s+into\s+([a-z_][a-z0-9_]*)").unwrap())
}
fn mutating_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(insert|update|delete)\b").unwrap())
}
fn aggregate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(count|sum|avg|min|max)\s*\(").unwrap())
}
fn window_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bover\s*\(").unwrap())
}
fn analytical_view_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:from|join)\s+([a-z_][a-z0-9_]*_v2)\b").unwrap())
}
fn time_bucket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(date_trunc|time_bucket)\s*\(").unwrap())
}
fn reporting_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:from|join)\s+([a-z_][a-z0-9_]*report[a-z0-9_]*)\b").unwrap())
}
fn auth_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:from|join)\s+(users|sessions)\b").unwrap())
}
fn single_row_predicate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bwhere\b[^;]*\b(id|email)\s*=").unwrap())
}
fn subquery_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\(\s*select\b").unwrap())
}
fn in_subquery_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bin\s*\(\s*select\b").unwrap())
}
fn join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bjoin\b").unwrap())
}
fn group_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bgroup\s+by\b").unwrap())
}
fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\blimit\s+\d+").unwrap())
}

/// Parses SQL-like analytical requests into a `QueryPlan` (spec §4.8).
/// Stateless apart from the shared rolling-statistics cache.
pub struct QueryClassifier {
    stats: TableStatsCache,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClassifier {
    pub fn new() -> Self {
        Self {
            stats: TableStatsCache::new(),
        }
    }

    /// Feed back a successful execution's observed cost so future
    /// estimates for the same tables improve.
    pub fn record_execution(&self, tables: &[String], rows: u64, duration_ms: u64) {
        self.stats.record(tables, rows, duration_ms);
    }

    pub fn analyze(&self, sql: &str, context: &ClassifierContext) -> QueryPlan {
        let tables = Self::extract_tables(sql);
        let (est_rows, est_duration_ms) = self.stats.estimate(&tables);
        let join_count = join_re().find_iter(sql).count();
        let subquery_depth = subquery_re().find_iter(sql).count();
        let aggregate_count = aggregate_re().find_iter(sql).count();
        let complexity = Self::score_complexity(join_count, subquery_depth, aggregate_count);
        let is_mutating = mutating_re().is_match(sql);

        let (query_type, target) = self.classify_type_and_target(sql, &tables, est_rows, context);

        let mut hints = Vec::new();
        if !limit_re().is_match(sql) && est_rows > context.large_result_threshold {
            hints.push(OptimizationHint::AddLimit);
        }
        if join_count >= 2 && sql.to_lowercase().contains("where") {
            hints.push(OptimizationHint::PushdownPredicate);
        }
        if in_subquery_re().is_match(sql) {
            hints.push(OptimizationHint::SubqueryToJoin);
        }

        debug!(
            query_type = %query_type,
            complexity = %complexity,
            est_rows,
            tables = ?tables,
            "classified query"
        );

        QueryPlan {
            query_type,
            complexity,
            est_rows,
            est_memory_mb: (est_rows / 10_000).max(1),
            est_duration_ms,
            target,
            optimization_hints: hints,
            tables,
            is_mutating,
        }
    }

    fn classify_type_and_target(
        &self,
        sql: &str,
        tables: &[String],
        est_rows: u64,
        context: &ClassifierContext,
    ) -> (QueryType, Target) {
        if auth_table_re().is_match(sql) && single_row_predicate_re().is_match(sql) {
            return (QueryType::UserAuth, Target::Oltp);
        }

        if mutating_re().is_match(sql) {
            return (QueryType::ProjectCrud, Target::Oltp);
        }

        let multi_aggregate_group_by = group_by_re().is_match(sql) && aggregate_re().find_iter(sql).count() > 1;
        let has_window_fn = window_fn_re().is_match(sql);
        let references_analytical_view = analytical_view_re().is_match(sql);
        let scans_above_threshold = est_rows >= context.olap_row_threshold;

        // Queries against a named reporting table/view are tagged REPORTING
        // ahead of the generic AGGREGATION/ANALYTICS buckets, since it's the
        // one OLAP-targeted type that's eligible to degrade to OLTP when the
        // OLAP breaker is open.
        if reporting_table_re().is_match(sql) {
            return (QueryType::Reporting, Target::Olap);
        }

        if multi_aggregate_group_by {
            return (QueryType::Aggregation, Target::Olap);
        }
        if has_window_fn || references_analytical_view || scans_above_threshold {
            return (QueryType::Analytics, Target::Olap);
        }

        if time_bucket_re().is_match(sql) {
            return (QueryType::TimeSeries, Target::Olap);
        }

        let touches_oltp_only = tables.iter().any(|t| context.oltp_only_tables.contains(t));
        let touches_olap_only = tables.iter().any(|t| context.olap_only_tables.contains(t));
        if touches_oltp_only && touches_olap_only {
            return (QueryType::Hybrid, Target::Hybrid);
        }

        (QueryType::RealTime, Target::Oltp)
    }

    fn extract_tables(sql: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for re in [table_re(), update_target_re(), insert_target_re()] {
            for capture in re.captures_iter(sql) {
                let name = capture[1].to_lowercase();
                if seen.insert(name.clone()) {
                    tables.push(name);
                }
            }
        }
        tables
    }

    fn score_complexity(join_count: usize, subquery_depth: usize, aggregate_count: usize) -> Complexity {
        let score = join_count + subquery_depth + aggregate_count;
        match score {
            0 => Complexity::Simple,
            1..=2 => Complexity::Moderate,
            3..=5 => Complexity::Complex,
            _ => Complexity::VeryComplex,
        }
    }
}
