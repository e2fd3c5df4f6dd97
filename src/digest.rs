//! Fetch-step entry points: feed → gists → figures → [`PaperBatch`].
//!
//! Per-paper failures never abort the batch. A paper whose gist fails is
//! skipped; a paper whose figure fails is kept without one.

use crate::config::{is_known_category, DigestConfig};
use crate::error::DigestError;
use crate::output::{Paper, PaperBatch};
use crate::pipeline::feed::{ArxivClient, PaperRecord};
use crate::pipeline::figure::FigureExtractor;
use crate::pipeline::gist::GistGenerator;
use crate::progress::{DigestProgressCallback, NoopProgressCallback};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Midnight UTC of `day`.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Default target day: two days before `today`, at 00:00 UTC.
///
/// Submissions of the last two days are usually not in the feed yet.
pub fn default_target_day(today: NaiveDate) -> DateTime<Utc> {
    day_start(today.checked_sub_days(Days::new(2)).unwrap_or(today))
}

/// Parse a `YYYY-MM-DD` day into midnight UTC.
pub fn parse_day(s: &str) -> Result<DateTime<Utc>, DigestError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map(day_start)
        .map_err(|e| DigestError::InvalidConfig(format!("invalid date '{s}' (expected YYYY-MM-DD): {e}")))
}

/// Turn feed records into enriched papers, in order.
///
/// Always returns a batch tagged with `date`, possibly empty.
pub async fn digest_papers(
    records: &[PaperRecord],
    date: DateTime<Utc>,
    gists: &GistGenerator,
    figures: &FigureExtractor,
    progress: &dyn DigestProgressCallback,
) -> PaperBatch {
    let total = records.len();
    progress.on_batch_start(total);
    let mut batch = PaperBatch::empty(date);

    for (i, record) in records.iter().enumerate() {
        let index = i + 1;
        progress.on_paper_start(index, total, &record.title);
        let started = Instant::now();

        let gist = match gists
            .summarize(&record.title, &record.abstract_text, &record.url)
            .await
        {
            Ok(gist) => gist,
            Err(e) => {
                error!("Skipping \"{}\": {}", record.title, e);
                progress.on_paper_skipped(index, total, &record.title, &e.to_string());
                continue;
            }
        };

        let first_figure_path = match &record.pdf_url {
            Some(pdf_url) => match figures.extract_first_figure(pdf_url).await {
                Ok(path) => path,
                Err(e) => {
                    warn!("No figure for \"{}\": {}", record.title, e);
                    None
                }
            },
            None => None,
        };

        info!(
            "Processed \"{}\" in {:?} (figure: {})",
            record.title,
            started.elapsed(),
            first_figure_path.is_some()
        );
        progress.on_paper_complete(index, total, first_figure_path.is_some());
        batch.papers.push(Paper {
            title: record.title.clone(),
            author: record.author_line(),
            gist,
            url: record.url.clone(),
            first_figure_path,
        });
    }

    progress.on_batch_complete(total, batch.papers.len());
    batch
}

/// Fetch `category` for the day starting at `date` and digest it.
///
/// `category` must be one of [`crate::ARXIV_CATEGORIES`].
pub async fn fetch_and_digest(
    category: &str,
    date: DateTime<Utc>,
    config: &DigestConfig,
) -> Result<PaperBatch, DigestError> {
    if !is_known_category(category) {
        return Err(DigestError::InvalidConfig(format!(
            "unknown arXiv category '{category}'"
        )));
    }
    let gists = GistGenerator::from_config(config)?;
    let figures = FigureExtractor::from_config(config);
    tokio::fs::create_dir_all(figures.images_dir())
        .await
        .map_err(|e| DigestError::OutputWriteFailed {
            path: figures.images_dir().to_path_buf(),
            source: e,
        })?;

    let records = ArxivClient::from_config(config)
        .fetch(category, date, config.max_papers)
        .await?;
    info!("{} papers to process for {}", records.len(), category);

    let noop = NoopProgressCallback;
    let progress: &dyn DigestProgressCallback = match &config.progress_callback {
        Some(cb) => cb.as_ref(),
        None => &noop,
    };
    Ok(digest_papers(&records, date, &gists, &figures, progress).await)
}

/// [`fetch_and_digest`], then write the batch to its file. Returns the path.
pub async fn run_fetch(
    category: &str,
    date: DateTime<Utc>,
    config: &DigestConfig,
) -> Result<PathBuf, DigestError> {
    let batch = fetch_and_digest(category, date, config).await?;
    let path = config.batch_path(category);
    batch.save(&path).await?;
    info!("Saved {} papers to {}", batch.papers.len(), path.display());
    Ok(path)
}
