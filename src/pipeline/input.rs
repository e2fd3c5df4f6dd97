//! PDF download into a scratch directory.
//!
//! pdfium wants a file-system path, so the PDF is written into a `TempDir`
//! that lives exactly as long as the returned [`DownloadedPdf`]. The `%PDF`
//! magic is checked before returning so an HTML error page surfaces as
//! [`DigestError::NotAPdf`] rather than a pdfium failure.

use crate::error::DigestError;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// A downloaded PDF. The file is deleted when this is dropped.
#[derive(Debug)]
pub struct DownloadedPdf {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl DownloadedPdf {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Last non-empty path segment of `url`, e.g. `2401.00002v1` for
/// `http://arxiv.org/pdf/2401.00002v1`.
pub fn pdf_basename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_else(|| "paper".to_string())
}

/// Download `url` into a fresh temporary directory.
pub async fn download_pdf(url: &str, timeout_secs: u64) -> Result<DownloadedPdf, DigestError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| DigestError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let temp_dir = TempDir::new().map_err(|e| DigestError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(format!("{}.pdf", pdf_basename(url)));

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(DigestError::NotAPdf { path, magic });
    }

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| DigestError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    debug!("Downloaded {} bytes to {}", bytes.len(), path.display());

    Ok(DownloadedPdf {
        path,
        _temp_dir: temp_dir,
    })
}
