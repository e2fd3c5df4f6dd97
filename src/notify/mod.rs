//! Notify step: post a [`PaperBatch`] to a Slack channel.
//!
//! ```text
//! parent  "*The last N papers ...*"
//!   └── thread  summary of paper 1  [figure]
//!   └── thread  summary of paper 2
//! ```
//!
//! Slack sometimes rejects a freshly uploaded image as an invalid
//! `slack_file`; such a message is sent once more without the image.

pub mod blocks;
pub mod slack;

use crate::config::NotifyConfig;
use crate::error::DigestError;
use crate::output::{Paper, PaperBatch};
use blocks::{paper_blocks, parent_text, thread_text};
use slack::{PostMessage, SlackClient};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Instrument, Span};

/// `path` if it names a non-empty file.
pub async fn usable_image(path: Option<&Path>) -> Option<PathBuf> {
    let path = path?;
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path.to_path_buf()),
        Ok(_) => {
            warn!("Ignoring empty image {}", path.display());
            None
        }
        Err(e) => {
            warn!("Ignoring missing image {}: {}", path.display(), e);
            None
        }
    }
}

/// Publishes batches to Slack.
pub struct Notifier {
    slack: SlackClient,
    upload_settle: Duration,
    thread_delay: Duration,
    span: Span,
}

impl Notifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            slack: SlackClient::new(config),
            upload_settle: config.upload_settle,
            thread_delay: config.thread_delay,
            span: tracing::info_span!("notify"),
        }
    }

    /// Post `batch` to `channel`. An empty batch posts nothing.
    pub async fn publish(&self, batch: &PaperBatch, channel: &str) -> Result<(), DigestError> {
        async {
            if batch.papers.is_empty() {
                info!("No papers in batch; nothing to post");
                return Ok(());
            }

            let parent_ts = self
                .slack
                .post_message(&PostMessage {
                    channel: channel.to_string(),
                    text: parent_text(batch),
                    mrkdwn: Some(true),
                    thread_ts: None,
                    blocks: None,
                })
                .await?;

            for paper in &batch.papers {
                self.post_paper(paper, channel, &parent_ts).await?;
                tokio::time::sleep(self.thread_delay).await;
            }
            info!("Posted {} papers to {}", batch.papers.len(), channel);
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    async fn upload_figure(&self, path: &Path) -> Option<String> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                return None;
            }
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "figure".to_string());
        match self.slack.upload_file(&filename, bytes).await {
            Ok(id) => {
                tokio::time::sleep(self.upload_settle).await;
                Some(id)
            }
            Err(e) => {
                warn!("Posting without figure: {}", e);
                None
            }
        }
    }

    async fn post_paper(&self, paper: &Paper, channel: &str, parent_ts: &str) -> Result<(), DigestError> {
        let file_id = match usable_image(paper.first_figure_path.as_deref()).await {
            Some(path) => self.upload_figure(&path).await,
            None => None,
        };

        let message = |file_id: Option<&str>| PostMessage {
            channel: channel.to_string(),
            text: thread_text(paper),
            mrkdwn: None,
            thread_ts: Some(parent_ts.to_string()),
            blocks: Some(paper_blocks(paper, file_id)),
        };

        match self.slack.post_message(&message(file_id.as_deref())).await {
            Ok(_) => Ok(()),
            Err(e @ DigestError::SlackApi { .. }) if file_id.is_some() => {
                warn!("\"{}\" rejected with figure ({}); retrying without", paper.title, e);
                self.slack.post_message(&message(None)).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}
