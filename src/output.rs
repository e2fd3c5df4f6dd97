//! Records produced by the fetch step and consumed by the notify step.
//!
//! [`PaperBatch`] is serialised as JSON to `papers-{category}.json`; field
//! names are part of the file format and must not change.

use crate::error::DigestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A link the summarizer found helpful, with a short label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceUrl {
    pub url: String,
    pub text: String,
}

/// Four-field structured summary of a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gist {
    /// What the research did.
    pub about: String,
    /// What it tried to achieve.
    pub objective: String,
    /// How it improves on existing work.
    pub novelty: String,
    /// Its most important findings.
    pub key: String,
    /// Validated reference links; empty when none survived.
    #[serde(default)]
    pub reference_urls: Vec<ReferenceUrl>,
}

impl Gist {
    /// Whether every one of the four text fields has content.
    pub fn is_complete(&self) -> bool {
        [&self.about, &self.objective, &self.novelty, &self.key]
            .iter()
            .all(|f| !f.trim().is_empty())
    }
}

/// A paper enriched with its gist and (optionally) its first figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    /// Comma-separated author names.
    pub author: String,
    pub gist: Gist,
    /// Canonical abstract page URL.
    pub url: String,
    pub first_figure_path: Option<PathBuf>,
}

/// One day's worth of papers for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperBatch {
    pub date: DateTime<Utc>,
    pub papers: Vec<Paper>,
}

impl PaperBatch {
    /// An empty batch for `date`.
    pub fn empty(date: DateTime<Utc>) -> Self {
        Self {
            date,
            papers: Vec::new(),
        }
    }

    /// Read a batch written by [`PaperBatch::save`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DigestError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DigestError::BatchReadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        serde_json::from_str(&text).map_err(|e| DigestError::BatchReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Write the batch as JSON.
    ///
    /// Uses atomic write (temp file + rename) so the notify step never reads
    /// a half-written file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), DigestError> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| DigestError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let json = serde_json::to_string(self)
            .map_err(|e| DigestError::Internal(format!("serialise batch: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
        Ok(())
    }
}
