use crate::wiring;
use archive_common::{Priority, SystemConfig};
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct SqlArgs {
    /// The SQL-like statement to route
    sql: String,
    /// Admission priority: low, normal, high, critical
    #[arg(long, default_value = "normal")]
    priority: String,
    /// Disable result caching for this call
    #[arg(long)]
    no_cache: bool,
    /// Cache/tenant partition key
    #[arg(long, default_value = "default")]
    context_key: String,
}

fn parse_priority(raw: &str) -> anyhow::Result<Priority> {
    match raw.to_lowercase().as_str() {
        "low" => Ok(Priority::Low),
        "normal" => Ok(Priority::Normal),
        "high" => Ok(Priority::High),
        "critical" => Ok(Priority::Critical),
        other => anyhow::bail!("unknown priority '{other}', expected low|normal|high|critical"),
    }
}

pub async fn run(args: SqlArgs, config: &SystemConfig) -> anyhow::Result<()> {
    let router = wiring::build_query_router(config).await?;
    let priority = parse_priority(&args.priority)?;
    let cancel = CancellationToken::new();

    let outcome = router
        .route(&args.sql, priority, !args.no_cache, &args.context_key, &cancel)
        .await?;

    println!(
        "type={} complexity={} target={:?} cache_hit={} degraded={}",
        outcome.plan.query_type, outcome.plan.complexity, outcome.plan.target, outcome.from_cache, outcome.degraded
    );
    for row in &outcome.rows {
        println!("{row}");
    }
    Ok(())
}
