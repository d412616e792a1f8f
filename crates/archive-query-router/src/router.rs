use crate::admission::AdmissionController;
use crate::cache::{CachedResult, ResultCache};
use crate::engine::{OlapExecutor, OltpExecutor};
use crate::error::{QueryRouterError, Result};
use crate::pools::PoolGroup;
use archive_breaker::{CircuitBreaker, CircuitState};
use archive_common::Priority;
use archive_query_classifier::{ClassifierContext, QueryClassifier, QueryPlan, QueryType, Target};
use serde_json::Value;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Outcome of routing one SQL statement through the hybrid router.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub rows: Vec<Value>,
    pub plan: QueryPlan,
    pub from_cache: bool,
    /// Set when an OLAP-targeted plan was served off the OLTP path because
    /// the OLAP breaker was open (spec §4.9's degradation policy).
    pub degraded: bool,
}

/// Entry point combining classification, admission control, result caching,
/// and engine dispatch for analytical + transactional queries alike
/// (spec §4.9's "Hybrid Query Router"). One instance is shared across all
/// callers; internal state (semaphores, cache, breakers) is all interior
/// mutability so `&self` suffices.
pub struct HybridQueryRouter {
    classifier: QueryClassifier,
    classifier_context: ClassifierContext,
    admission: AdmissionController,
    cache: ResultCache,
    oltp: PoolGroup<Box<dyn OltpExecutor>>,
    olap: PoolGroup<Box<dyn OlapExecutor>>,
    oltp_breaker: CircuitBreaker,
    olap_breaker: CircuitBreaker,
}

impl HybridQueryRouter {
    pub fn new(
        classifier_context: ClassifierContext,
        admission: AdmissionController,
        cache: ResultCache,
        oltp: PoolGroup<Box<dyn OltpExecutor>>,
        olap: PoolGroup<Box<dyn OlapExecutor>>,
        oltp_breaker: CircuitBreaker,
        olap_breaker: CircuitBreaker,
    ) -> Self {
        Self {
            classifier: QueryClassifier::new(),
            classifier_context,
            admission,
            cache,
            oltp,
            olap,
            oltp_breaker,
            olap_breaker,
        }
    }

    /// Route `sql`, honoring admission control, result caching, and
    /// OLAP-breaker degradation (spec §4.9). `context_key` distinguishes
    /// cache entries across tenants/callers sharing one router instance.
    #[instrument(skip(self, sql), fields(priority = %priority))]
    pub async fn route(
        &self,
        sql: &str,
        priority: Priority,
        use_cache: bool,
        context_key: &str,
        cancel: &CancellationToken,
    ) -> Result<RouteOutcome> {
        let plan = self.classifier.analyze(sql, &self.classifier_context);
        let cacheable = use_cache && !plan.forces_cache_disabled();
        let cache_key = cacheable
            .then(|| ResultCache::make_key(sql, plan.target, context_key));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.get(key).await {
                return Ok(RouteOutcome {
                    rows: cached.rows.clone(),
                    plan,
                    from_cache: true,
                    degraded: cached.degraded,
                });
            }
        }

        let _admission = self.admission.acquire(priority, cancel).await?;

        let started = Instant::now();
        let (rows, degraded) = match plan.target {
            Target::Oltp => (self.execute_oltp(sql).await?, false),
            Target::Olap => self.execute_olap_with_degradation(sql, &plan).await?,
            Target::Hybrid => (self.execute_hybrid(sql, &plan).await?, false),
        };
        self.classifier.record_execution(&plan.tables, rows.len() as u64, started.elapsed().as_millis() as u64);

        if plan.is_mutating {
            for table in &plan.tables {
                self.cache.invalidate_table(table).await;
            }
        } else if let Some(key) = cache_key {
            self.cache
                .put(key, CachedResult { rows: rows.clone(), degraded }, &plan.tables)
                .await;
        }

        Ok(RouteOutcome { rows, plan, from_cache: false, degraded })
    }

    async fn execute_oltp(&self, sql: &str) -> Result<Vec<Value>> {
        let lease = self.oltp.least_in_flight();
        let sql = sql.to_string();
        self.oltp_breaker
            .call(|| async { lease.get().query_rows(&sql).await })
            .await
            .map_err(Into::into)
    }

    async fn execute_olap(&self, sql: &str) -> Result<Vec<Value>> {
        let lease = self.olap.least_in_flight();
        let sql = sql.to_string();
        self.olap_breaker
            .call(|| async { lease.get().query_rows(&sql).await })
            .await
            .map_err(Into::into)
    }

    /// `TIME_SERIES` never degrades (spec §4.9's explicit carve-out);
    /// `REPORTING` falls back to OLTP with the result flagged `degraded`;
    /// every other OLAP-targeted type fails closed with `ServiceDegraded`
    /// once the OLAP breaker is open. Checked up front rather than letting
    /// the breaker reject the call, so `REPORTING` can redirect instead of
    /// erroring.
    async fn execute_olap_with_degradation(&self, sql: &str, plan: &QueryPlan) -> Result<(Vec<Value>, bool)> {
        if self.olap_breaker.state().await != CircuitState::Open {
            return Ok((self.execute_olap(sql).await?, false));
        }

        match plan.query_type {
            QueryType::TimeSeries => Err(QueryRouterError::ServiceDegraded(
                "olap unavailable and time-series queries never degrade to oltp".to_string(),
            )),
            QueryType::Reporting => {
                warn!("olap breaker open, degrading reporting query to oltp");
                Ok((self.execute_oltp(sql).await?, true))
            }
            _ => Err(QueryRouterError::ServiceDegraded(
                "olap unavailable for this query type".to_string(),
            )),
        }
    }

    /// Two-stage hybrid execution (spec §4.9): stage one runs the original
    /// statement against OLTP to collect correlation keys from the first
    /// OLTP-only table it touches, stage two re-targets an OLAP-only table
    /// with those keys as an `IN (...)` predicate. Full cross-engine SQL
    /// rewriting is out of scope; this handles the common "join an OLTP
    /// dimension table against an OLAP fact table" shape.
    async fn execute_hybrid(&self, sql: &str, plan: &QueryPlan) -> Result<Vec<Value>> {
        let oltp_table = plan
            .tables
            .iter()
            .find(|t| self.classifier_context.oltp_only_tables.contains(*t))
            .cloned();
        let olap_table = plan
            .tables
            .iter()
            .find(|t| self.classifier_context.olap_only_tables.contains(*t))
            .cloned();

        let (Some(oltp_table), Some(olap_table)) = (oltp_table, olap_table) else {
            info!("hybrid plan lacks a recognized oltp/olap table pair, falling back to oltp");
            return self.execute_oltp(sql).await;
        };

        let stage1_sql = format!("SELECT id FROM {oltp_table}");
        let keys_rows = self.execute_oltp(&stage1_sql).await?;
        let keys: Vec<String> = keys_rows
            .iter()
            .filter_map(|row| row.get("id"))
            .map(|v| v.to_string())
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let fk_column = format!("{oltp_table}_id");
        let stage2_sql = format!(
            "SELECT * FROM {olap_table} WHERE {fk_column} IN ({})",
            keys.join(", ")
        );
        self.execute_olap(&stage2_sql).await
    }
}
