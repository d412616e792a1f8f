use crate::wiring;
use archive_common::{Deadline, Preference, SystemConfig};
use chrono::{DateTime, Utc};
use clap::Args;
use std::time::Duration;

#[derive(Args)]
pub struct QueryArgs {
    /// Domain to query, e.g. example.com
    domain: String,
    /// Start of the capture window, RFC 3339
    #[arg(long)]
    from: DateTime<Utc>,
    /// End of the capture window, RFC 3339
    #[arg(long)]
    to: DateTime<Utc>,
    /// Which provider family to start from: wayback, commoncrawl, hybrid
    #[arg(long)]
    preference: Option<String>,
    /// Overall deadline budget in seconds
    #[arg(long, default_value_t = 30)]
    timeout_s: u64,
}

fn parse_preference(raw: &str) -> anyhow::Result<Preference> {
    match raw.to_lowercase().as_str() {
        "wayback" => Ok(Preference::Wayback),
        "commoncrawl" => Ok(Preference::CommonCrawl),
        "hybrid" => Ok(Preference::Hybrid),
        other => anyhow::bail!("unknown preference '{other}', expected wayback|commoncrawl|hybrid"),
    }
}

pub async fn run(args: QueryArgs, config: &SystemConfig) -> anyhow::Result<()> {
    let router = wiring::build_archive_router(config);
    let preference = match &args.preference {
        Some(raw) => parse_preference(raw)?,
        None => wiring::default_preference(config),
    };
    let deadline = Deadline::after(Duration::from_secs(args.timeout_s));

    let (captures, stats) = router
        .query_unified(&args.domain, args.from, args.to, preference, deadline)
        .await?;

    println!(
        "resolved via {:?} after {} attempt(s), {} capture(s) kept",
        stats.successful_strategy,
        stats.attempts,
        captures.len()
    );
    for capture in &captures {
        println!("{}", serde_json::to_string(capture)?);
    }
    Ok(())
}
