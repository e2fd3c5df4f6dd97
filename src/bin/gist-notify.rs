//! CLI binary for the notify step.
//!
//! Reads `papers-{category}.json` and posts it to a Slack channel. The bot
//! token comes from `SLACK_API_TOKEN`; a `.env` file is honoured.

use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::Parser;
use paper_gist::config::batch_path;
use paper_gist::{Notifier, NotifyConfig, PaperBatch, ARXIV_CATEGORIES};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Post a digested batch of papers to Slack.
#[derive(Parser, Debug)]
#[command(
    name = "gist-notify",
    version,
    about = "Post a digested batch of arXiv papers to a Slack channel",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// arXiv category whose batch is posted.
    #[arg(long, env = "GIST_CATEGORY",
          value_parser = PossibleValuesParser::new(ARXIV_CATEGORIES.iter().copied()))]
    category: String,

    /// Slack channel ID to post to.
    #[arg(long, env = "SLACK_CHANNEL_ID")]
    channel_id: String,

    /// Directory holding the batch file.
    #[arg(long, env = "GIST_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GIST_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let path = batch_path(&cli.data_dir, &cli.category);
    let batch = PaperBatch::load(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if batch.papers.is_empty() {
        info!("No papers were submitted on {}", batch.date.format("%Y-%m-%d"));
        return Ok(());
    }

    let config = NotifyConfig::from_env().context("Slack is not configured")?;
    Notifier::new(&config)
        .publish(&batch, &cli.channel_id)
        .await
        .context("Posting to Slack failed")?;
    Ok(())
}
