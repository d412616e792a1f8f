use crate::wiring;
use archive_common::SystemConfig;
use clap::Args;

#[derive(Args)]
pub struct ExtractArgs {
    /// Path to a saved HTML document
    html_file: String,
    /// Original URL the document was captured from
    url: String,
    /// Optional live URL to reach through to if every local tier fails
    #[arg(long)]
    reach_through_url: Option<String>,
}

pub async fn run(args: ExtractArgs, config: &SystemConfig) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(&args.html_file)?;
    let cascade = wiring::build_extractor_cascade(config);

    let outcome = cascade
        .extract(&html, &args.url, args.reach_through_url.as_deref())
        .await?;

    println!("tier: {}", outcome.tier_used);
    println!("{}", outcome.text);
    Ok(())
}
