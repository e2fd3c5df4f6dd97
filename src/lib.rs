//! # paper-gist
//!
//! Summarise the day's arXiv submissions of one category with language
//! models, pull each paper's first figure out of its PDF, and post the result
//! to a Slack thread.
//!
//! ## Pipeline Overview
//!
//! ```text
//! fetch step (gist-fetch)                         notify step (gist-notify)
//!
//! arXiv feed ─▶ day filter ─▶ per paper:          papers-{category}.json
//!                              ├─ gist  (LLM)            │
//!                              └─ figure (pdfium)        ├─ parent message
//!                 ─▶ papers-{category}.json              └─ one thread reply per paper
//! ```
//!
//! 1. **Feed**   newest entries of a category, cut to one UTC day
//! 2. **Gist**   summarizer (optionally a tool-using agent) then formatter,
//!    validated against a four-field schema with bounded retries
//! 3. **Figure** first image of the first page that has one, kept if ≥ 4:3
//! 4. **Notify** Slack Block Kit messages, with an image-less fallback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_gist::{run_fetch, parse_day, DigestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Talks to a local Ollama at http://127.0.0.1:11434 by default.
//!     let config = DigestConfig::builder().data_dir("./data").build()?;
//!     let path = run_fetch("cs.AI", parse_day("2024-01-02")?, &config).await?;
//!     println!("batch written to {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `gist-fetch` and `gist-notify` binaries |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paper-gist = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    is_known_category, DigestConfig, DigestConfigBuilder, GistMode, NotifyConfig, ARXIV_CATEGORIES,
};
pub use digest::{default_target_day, digest_papers, fetch_and_digest, parse_day, run_fetch};
pub use error::{DigestError, GistError};
pub use notify::Notifier;
pub use output::{Gist, Paper, PaperBatch, ReferenceUrl};
pub use pipeline::feed::{ArxivClient, PaperRecord};
pub use pipeline::figure::FigureExtractor;
pub use pipeline::gist::{GistGenerator, Summarizer};
pub use pipeline::llm::ChatModel;
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback};
