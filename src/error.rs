//! Error types for the paper-gist library.
//!
//! Two error types for two failure modes:
//!
//! * [`DigestError`] — **Fatal**: the run cannot proceed (feed unreachable,
//!   provider not configured, Slack rejected the parent message). Returned as
//!   `Err(DigestError)` from the top-level entry points.
//!
//! * [`GistError`] — **Non-fatal**: a single paper could not be summarised.
//!   The orchestrator logs it and moves on to the next paper, so one bad
//!   model reply never costs the whole batch.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper-gist library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Feed errors ───────────────────────────────────────────────────────
    /// The arXiv query could not be sent or returned a non-success status.
    #[error("arXiv query for '{category}' failed: {reason}\nCheck your internet connection.")]
    FeedRequestFailed { category: String, reason: String },

    /// The arXiv response was not a parseable Atom feed.
    #[error("Could not parse arXiv feed: {detail}")]
    FeedParseFailed { detail: String },

    // ── Download errors ───────────────────────────────────────────────────
    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The downloaded body is not a PDF.
    #[error("Downloaded file is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key, bad name).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH to the directory holding libpdfium, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Slack errors ──────────────────────────────────────────────────────
    /// Slack answered `ok: false` (or the request never reached it).
    #[error("Slack API '{method}' failed: {error}")]
    SlackApi { method: String, error: String },

    /// `SLACK_API_TOKEN` is missing.
    #[error("Slack token is not set.\nExport SLACK_API_TOKEN or put it in a .env file.")]
    MissingSlackToken,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read or parse a persisted batch file.
    #[error("Failed to read paper batch '{path}': {detail}")]
    BatchReadFailed { path: PathBuf, detail: String },

    /// Could not create or write the batch file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DigestError {
    /// Build a [`DigestError::SlackApi`] for `method`.
    pub fn slack(method: impl Into<String>, error: impl Into<String>) -> Self {
        DigestError::SlackApi {
            method: method.into(),
            error: error.into(),
        }
    }
}

/// A non-fatal error for a single paper.
///
/// Raised by [`crate::pipeline::gist::GistGenerator`]; the caller skips the
/// paper and continues with the rest of the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GistError {
    /// The model backend failed (connection refused, HTTP 5xx, …).
    #[error("model '{model}' call failed: {detail}")]
    ModelCallFailed { model: String, detail: String },

    /// Formatter output never matched the gist schema.
    #[error("formatter output did not match the gist schema after {attempts} attempts: {detail}")]
    SchemaViolation { attempts: u32, detail: String },
}
