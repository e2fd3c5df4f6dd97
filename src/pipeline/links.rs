//! Reference-link validation.
//!
//! Every `(url, text)` pair the formatter returns is checked before it reaches
//! the batch. A rejected link is dropped on its own with a warning; it never
//! fails the gist it came with.

use crate::error::DigestError;
use crate::output::ReferenceUrl;
use crate::pipeline::postprocess::is_placeholder_host;
use reqwest::Url;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Hosts a reference may not point at: the feed itself and venues the
/// summarizer is told to avoid.
const SELF_REFERENCE_HOSTS: &[&str] = &["arxiv.org", "mdpi.com"];

/// Why a reference was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRejection {
    /// Not an absolute http(s) URL.
    InvalidUrl,
    /// Host is a placeholder such as `example.com`.
    Placeholder,
    /// Points at the paper itself or at the feed's own site.
    SelfReference,
    /// The server answered with a non-success status.
    HttpStatus(u16),
    /// No answer within the timeout, or the connection failed.
    Unreachable(String),
}

impl fmt::Display for LinkRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRejection::InvalidUrl => write!(f, "not an absolute http(s) URL"),
            LinkRejection::Placeholder => write!(f, "placeholder domain"),
            LinkRejection::SelfReference => write!(f, "refers to the paper or arXiv itself"),
            LinkRejection::HttpStatus(code) => write!(f, "HTTP {code}"),
            LinkRejection::Unreachable(detail) => write!(f, "unreachable: {detail}"),
        }
    }
}

/// Checks reference links for reachability and plausibility.
#[derive(Debug, Clone)]
pub struct LinkChecker {
    client: reqwest::Client,
}

impl LinkChecker {
    /// A checker whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DigestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("paper-gist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DigestError::Internal(format!("HTTP client for link checks: {e}")))?;
        Ok(Self { client })
    }

    /// Static checks that need no network.
    pub fn precheck(url: &str, paper_url: &str) -> Result<Url, LinkRejection> {
        let parsed = Url::parse(url.trim()).map_err(|_| LinkRejection::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LinkRejection::InvalidUrl);
        }
        let host = parsed.host_str().ok_or(LinkRejection::InvalidUrl)?;
        if is_placeholder_host(host) {
            return Err(LinkRejection::Placeholder);
        }
        if is_self_reference(host, &parsed, paper_url) {
            return Err(LinkRejection::SelfReference);
        }
        Ok(parsed)
    }

    /// Full check: static rules, then a GET that must succeed.
    pub async fn check(&self, url: &str, paper_url: &str) -> Result<(), LinkRejection> {
        let parsed = Self::precheck(url, paper_url)?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| LinkRejection::Unreachable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(LinkRejection::HttpStatus(status.as_u16()))
        }
    }

    /// Keep only the references that pass [`LinkChecker::check`], in order.
    pub async fn filter(&self, references: Vec<ReferenceUrl>, paper_url: &str) -> Vec<ReferenceUrl> {
        let mut kept = Vec::with_capacity(references.len());
        for reference in references {
            match self.check(&reference.url, paper_url).await {
                Ok(()) => {
                    debug!("Kept reference {}", reference.url);
                    kept.push(reference);
                }
                Err(reason) => warn!("Dropped reference {} ({})", reference.url, reason),
            }
        }
        kept
    }
}

fn is_self_reference(host: &str, url: &Url, paper_url: &str) -> bool {
    let host = host.to_ascii_lowercase();
    if SELF_REFERENCE_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    {
        return true;
    }
    let paper = paper_url.trim().trim_end_matches('/');
    !paper.is_empty() && url.as_str().trim_end_matches('/') == paper
}
