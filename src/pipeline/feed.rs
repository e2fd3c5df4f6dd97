//! arXiv Atom feed client and day selection.
//!
//! The API cannot filter by submission day, so [`ArxivClient::fetch`] asks
//! for the newest `feed_fetch_size` entries of a category and
//! [`select_for_day`] cuts them down locally.

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::pipeline::postprocess::collapse_whitespace;
use chrono::{DateTime, Duration, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::cmp::Reverse;
use tracing::{debug, info, Instrument, Span};

/// One feed entry, as needed downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    /// Canonical abstract URL, e.g. `http://arxiv.org/abs/2401.00001v1`.
    pub url: String,
    pub pdf_url: Option<String>,
    pub published: DateTime<Utc>,
    pub journal_ref: Option<String>,
}

impl PaperRecord {
    /// Author names joined with `", "`.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    fn journal_ref_len(&self) -> usize {
        self.journal_ref.as_deref().map(|j| j.trim().len()).unwrap_or(0)
    }
}

/// Keep records published in `[date, date + 1 day)`; if more than `max_count`
/// remain, prefer the longest journal references and truncate.
///
/// The sort is stable, so records with equal journal-reference length keep
/// their feed order.
pub fn select_for_day(
    records: Vec<PaperRecord>,
    date: DateTime<Utc>,
    max_count: usize,
) -> Vec<PaperRecord> {
    let end = date + Duration::days(1);
    let mut kept: Vec<PaperRecord> = records
        .into_iter()
        .filter(|r| r.published >= date && r.published < end)
        .collect();
    if kept.len() > max_count {
        kept.sort_by_key(|r| Reverse(r.journal_ref_len()));
        kept.truncate(max_count);
    }
    kept
}

// ── Atom wire format ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: DateTime<Utc>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "arxiv:journal_ref", alias = "journal_ref", default)]
    journal_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

impl From<Entry> for PaperRecord {
    fn from(entry: Entry) -> Self {
        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .map(|l| l.href.clone());
        PaperRecord {
            title: collapse_whitespace(&entry.title),
            authors: entry
                .authors
                .into_iter()
                .map(|a| collapse_whitespace(&a.name))
                .collect(),
            abstract_text: collapse_whitespace(&entry.summary),
            url: entry.id.trim().to_string(),
            pdf_url,
            published: entry.published,
            journal_ref: entry
                .journal_ref
                .map(|j| collapse_whitespace(&j))
                .filter(|j| !j.is_empty()),
        }
    }
}

/// Parse an Atom response body into records, in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<PaperRecord>, DigestError> {
    let feed: Feed = from_str(xml).map_err(|e| DigestError::FeedParseFailed {
        detail: e.to_string(),
    })?;
    Ok(feed.entries.into_iter().map(PaperRecord::from).collect())
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Client for the arXiv query API.
#[derive(Debug, Clone)]
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    fetch_size: usize,
    span: Span,
}

impl ArxivClient {
    pub fn new(base_url: impl Into<String>, fetch_size: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            fetch_size,
            span: tracing::info_span!("feed"),
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(config.feed_url.clone(), config.feed_fetch_size)
    }

    /// Newest entries of `category`, in feed order.
    pub async fn fetch_recent(&self, category: &str) -> Result<Vec<PaperRecord>, DigestError> {
        let failed = |reason: String| DigestError::FeedRequestFailed {
            category: category.to_string(),
            reason,
        };

        debug!("Querying {} for cat:{}", self.base_url, category);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", format!("cat:{category}")),
                ("sortBy", "submittedDate".to_string()),
                ("sortOrder", "descending".to_string()),
                ("start", "0".to_string()),
                ("max_results", self.fetch_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        parse_feed(&body)
    }

    /// Records of `category` published on the day starting at `date`, at most
    /// `max_count` of them.
    pub async fn fetch(
        &self,
        category: &str,
        date: DateTime<Utc>,
        max_count: usize,
    ) -> Result<Vec<PaperRecord>, DigestError> {
        async {
            let recent = self.fetch_recent(category).await?;
            let total = recent.len();
            let selected = select_for_day(recent, date, max_count);
            info!(
                "{} of {} recent {} entries selected for {}",
                selected.len(),
                total,
                category,
                date.format("%Y-%m-%d")
            );
            Ok(selected)
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>https://arxiv.org/api/abc</id>
  <title>arXiv Query</title>
  <updated>2024-01-03T00:00:00Z</updated>
  <opensearch:totalResults>2</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v1</id>
    <updated>2024-01-02T10:00:00Z</updated>
    <published>2024-01-02T10:00:00Z</published>
    <title>Scaling   Laws
      for Robots</title>
    <summary>  We study
  scaling.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name><arxiv:affiliation>Cambridge</arxiv:affiliation></author>
    <arxiv:comment>12 pages</arxiv:comment>
    <link href="http://arxiv.org/abs/2401.00002v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.00002v1" rel="related" type="application/pdf"/>
    <arxiv:journal_ref>ICRA 2024</arxiv:journal_ref>
    <arxiv:primary_category term="cs.RO" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.RO" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <updated>2024-01-01T23:59:59Z</updated>
    <published>2024-01-01T23:59:59Z</published>
    <title>Older Paper</title>
    <summary>Before the window.</summary>
    <author><name>Grace Hopper</name></author>
    <link href="http://arxiv.org/abs/2401.00001v1" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn record(title: &str, published: DateTime<Utc>, journal_ref: Option<&str>) -> PaperRecord {
        PaperRecord {
            title: title.to_string(),
            authors: vec!["A".into()],
            abstract_text: "abs".into(),
            url: format!("http://arxiv.org/abs/{title}"),
            pdf_url: None,
            published,
            journal_ref: journal_ref.map(str::to_string),
        }
    }

    #[test]
    fn parse_feed_extracts_fields() {
        let records = parse_feed(FEED).unwrap();
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.title, "Scaling Laws for Robots");
        assert_eq!(first.abstract_text, "We study scaling.");
        assert_eq!(first.author_line(), "Ada Lovelace, Alan Turing");
        assert_eq!(first.url, "http://arxiv.org/abs/2401.00002v1");
        assert_eq!(first.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2401.00002v1"));
        assert_eq!(first.journal_ref.as_deref(), Some("ICRA 2024"));
        assert_eq!(first.published, Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());

        assert_eq!(records[1].pdf_url, None);
        assert_eq!(records[1].journal_ref, None);
    }

    #[test]
    fn parse_feed_without_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn parse_feed_rejects_garbage() {
        assert!(matches!(
            parse_feed("<feed><entry><id>x</id></entry>"),
            Err(DigestError::FeedParseFailed { .. })
        ));
    }

    #[test]
    fn day_window_is_half_open() {
        let d = day(2024, 1, 2);
        let records = vec![
            record("before", d - Duration::seconds(1), None),
            record("start", d, None),
            record("inside", d + Duration::hours(12), None),
            record("end", d + Duration::days(1), None),
        ];
        let titles: Vec<String> = select_for_day(records, d, 10)
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["start", "inside"]);
    }

    #[test]
    fn journal_refs_are_preferred_when_truncating() {
        let d = day(2024, 1, 2);
        let at = d + Duration::hours(1);
        let records = vec![
            record("none", at, None),
            record("short", at, Some("ACL")),
            record("long", at, Some("NeurIPS 2024")),
            record("empty", at, Some("")),
            record("short2", at, Some("KDD")),
        ];
        let titles: Vec<String> = select_for_day(records, d, 3)
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["long", "short", "short2"]);
    }

    #[test]
    fn no_reordering_when_under_limit() {
        let d = day(2024, 1, 2);
        let at = d + Duration::hours(1);
        let records = vec![record("a", at, None), record("b", at, Some("ICML"))];
        let titles: Vec<String> = select_for_day(records, d, 2)
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn fetch_queries_category_and_filters_day() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("search_query".into(), "cat:cs.RO".into()),
                mockito::Matcher::UrlEncoded("sortBy".into(), "submittedDate".into()),
                mockito::Matcher::UrlEncoded("sortOrder".into(), "descending".into()),
                mockito::Matcher::UrlEncoded("max_results".into(), "80".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let client = ArxivClient::new(format!("{}/api/query", server.url()), 80);
        let records = client.fetch("cs.RO", day(2024, 1, 2), 20).await.unwrap();
        m.assert_async().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Scaling Laws for Robots");
    }

    #[tokio::test]
    async fn fetch_reports_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let client = ArxivClient::new(server.url(), 80);
        let err = client.fetch("cs.AI", day(2024, 1, 2), 20).await.unwrap_err();
        assert!(matches!(err, DigestError::FeedRequestFailed { ref category, .. } if category == "cs.AI"));
    }
}
