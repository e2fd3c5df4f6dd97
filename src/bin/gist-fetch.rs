//! CLI binary for the fetch step.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigestConfig`, runs the pipeline, and writes `papers-{category}.json`.

use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_gist::{
    default_target_day, parse_day, run_fetch, DigestConfig, DigestProgressCallback, GistMode,
    ProgressCallback, ARXIV_CATEGORIES,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per paper.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Querying arXiv…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            skipped: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} papers  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Digesting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total} papers selected"))
        ));
    }

    fn on_paper_start(&self, _index: usize, _total: usize, title: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(shorten(title, 60));
    }

    fn on_paper_complete(&self, index: usize, total: usize, has_figure: bool) {
        self.bar.println(format!(
            "  {} Paper {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            dim(if has_figure { "with figure" } else { "no figure  " }),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_paper_skipped(&self, index: usize, total: usize, title: &str, error: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Paper {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            shorten(title, 40),
            red(&shorten(error, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, kept: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!("{} {} papers digested", green("✔"), bold(&kept.to_string()));
        } else {
            eprintln!(
                "{} {}/{} papers digested  ({} skipped)",
                cyan("⚠"),
                bold(&kept.to_string()),
                total,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Papers submitted two days ago in cs.AI, local Ollama
  gist-fetch --category cs.AI

  # A specific day, agent summarizer
  gist-fetch --category cs.RO --date 2024-01-02 --summarizer-as-agent

  # One formatter call per paper
  gist-fetch --category cs.CL --single-stage --formatter-model qwen3:8b

ENVIRONMENT VARIABLES:
  RUST_LOG          Override the log filter (e.g. paper_gist=debug)
  PDFIUM_LIB_PATH   Directory (or file) of the pdfium shared library
"#;

/// Summarise one day of arXiv papers and extract their first figures.
#[derive(Parser, Debug)]
#[command(
    name = "gist-fetch",
    version,
    about = "Summarise one day of arXiv papers and extract their first figures",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv category, e.g. cs.AI.
    #[arg(long, env = "GIST_CATEGORY",
          value_parser = PossibleValuesParser::new(ARXIV_CATEGORIES.iter().copied()))]
    category: String,

    /// Submission day (YYYY-MM-DD, UTC). Default: two days before today.
    #[arg(long, env = "GIST_DATE")]
    date: Option<String>,

    /// Directory for the batch file and images.
    #[arg(long, env = "GIST_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Maximum papers per run.
    #[arg(long, env = "GIST_MAX_PAPERS", default_value_t = 20)]
    max_papers: usize,

    /// LLM provider (edgequake-llm name).
    #[arg(long, env = "GIST_PROVIDER", default_value = "ollama")]
    provider: String,

    /// Model for the free-form summary.
    #[arg(long, env = "GIST_SUMMARIZER_MODEL", default_value = "qwen3:8b")]
    summarizer_model: String,

    /// Let the summarizer search the web and fetch pages first.
    #[arg(long, env = "GIST_SUMMARIZER_AS_AGENT")]
    summarizer_as_agent: bool,

    /// Model that maps the summary onto the gist schema.
    #[arg(long, env = "GIST_FORMATTER_MODEL", default_value = "gemma3:4b")]
    formatter_model: String,

    /// Skip the summarizer; ask the formatter for JSON directly.
    #[arg(long, env = "GIST_SINGLE_STAGE")]
    single_stage: bool,

    /// Ollama endpoint.
    #[arg(long, env = "OLLAMA_API_BASE_URL", default_value = "http://127.0.0.1:11434")]
    ollama_api_base_url: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GIST_VERBOSE")]
    verbose: bool,

    /// Disable progress bar.
    #[arg(long, env = "GIST_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let date = match &cli.date {
        Some(d) => parse_day(d).context("Invalid --date")?,
        None => default_target_day(chrono::Local::now().date_naive()),
    };

    let progress: Option<ProgressCallback> = if cli.no_progress {
        None
    } else {
        Some(CliProgressCallback::new() as Arc<dyn DigestProgressCallback>)
    };

    let config = build_config(&cli, progress)?;
    let path = run_fetch(&cli.category, date, &config)
        .await
        .with_context(|| format!("Fetch failed for {}", cli.category))?;

    eprintln!(
        "{}  {} papers of {}  →  {}",
        green("✔"),
        cli.category,
        date.format("%Y-%m-%d"),
        bold(&path.display().to_string()),
    );
    Ok(())
}

/// Map CLI args to `DigestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigestConfig> {
    let mut builder = DigestConfig::builder()
        .data_dir(&cli.data_dir)
        .max_papers(cli.max_papers)
        .provider_name(&cli.provider)
        .summarizer_model(&cli.summarizer_model)
        .summarizer_as_agent(cli.summarizer_as_agent)
        .formatter_model(&cli.formatter_model)
        .ollama_base_url(&cli.ollama_api_base_url)
        .mode(if cli.single_stage {
            GistMode::SingleStage
        } else {
            GistMode::TwoStage
        });

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
