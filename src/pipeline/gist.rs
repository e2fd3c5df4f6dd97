//! Gist generation: title and abstract in, validated [`Gist`] out.
//!
//! Two-stage mode runs a free-form reasoning pass with the summarizer, then
//! asks the formatter to map that prose onto the gist schema. Single-stage
//! mode asks the formatter for JSON straight away. Formatter output goes
//! through [`parse_or_retry`]; reference links go through [`LinkChecker`].

use crate::config::{DigestConfig, GistMode};
use crate::error::{DigestError, GistError};
use crate::output::{Gist, ReferenceUrl};
use crate::pipeline::agent::AgentSummarizer;
use crate::pipeline::links::LinkChecker;
use crate::pipeline::llm::{provider_model, ChatModel, Turn};
use crate::pipeline::postprocess::{clean_field, extract_json_object, strip_think_tags};
use crate::prompts::{direct_gist_prompt, format_prompt, summary_prompt};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument, Span};

/// The reasoning-pass model, with or without tools.
pub enum Summarizer {
    Plain(Arc<dyn ChatModel>),
    Agent(AgentSummarizer),
}

impl Summarizer {
    pub fn name(&self) -> &str {
        match self {
            Summarizer::Plain(model) => model.name(),
            Summarizer::Agent(agent) => agent.name(),
        }
    }

    /// Free-form answer to `prompt`.
    pub async fn summarize(&self, prompt: &str) -> Result<String, GistError> {
        match self {
            Summarizer::Plain(model) => model.chat(&[Turn::user(prompt)]).await,
            Summarizer::Agent(agent) => agent.summarize(prompt).await,
        }
    }
}

/// Formatter reply as sent on the wire. Reference entries are kept loose so
/// one malformed link cannot fail the whole gist.
#[derive(Deserialize)]
struct RawGist {
    about: String,
    objective: String,
    novelty: String,
    key: String,
    #[serde(default)]
    reference_urls: serde_json::Value,
}

fn reference_entries(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Null => Vec::new(),
        other => {
            warn!("Ignoring reference_urls that is not a list: {}", other);
            Vec::new()
        }
    }
}

fn reference_from_value(value: serde_json::Value) -> Option<ReferenceUrl> {
    match serde_json::from_value::<ReferenceUrl>(value) {
        Ok(r) => {
            let reference = ReferenceUrl {
                url: r.url.trim().to_string(),
                text: clean_field(&r.text),
            };
            (!reference.url.is_empty()).then_some(reference)
        }
        Err(e) => {
            warn!("Dropping malformed reference entry: {}", e);
            None
        }
    }
}

/// Parse one raw formatter reply into a cleaned, complete [`Gist`].
///
/// The error string describes the schema failure. Only the four text fields
/// can fail the parse; bad reference entries are dropped.
pub fn parse_gist(raw: &str) -> Result<Gist, String> {
    let json = extract_json_object(raw);
    let raw: RawGist = serde_json::from_str(&json).map_err(|e| e.to_string())?;
    let gist = Gist {
        about: clean_field(&raw.about),
        objective: clean_field(&raw.objective),
        novelty: clean_field(&raw.novelty),
        key: clean_field(&raw.key),
        reference_urls: reference_entries(raw.reference_urls)
            .into_iter()
            .filter_map(reference_from_value)
            .collect(),
    };
    if gist.is_complete() {
        Ok(gist)
    } else {
        Err("a required field is empty".to_string())
    }
}

/// Obtain raw text from `produce` and parse it, up to `max_attempts` times.
///
/// Both model errors and schema failures consume an attempt. `produce`
/// receives the 1-based attempt number.
pub async fn parse_or_retry<F, Fut>(max_attempts: u32, mut produce: F) -> Result<Gist, GistError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, GistError>>,
{
    let attempts = max_attempts.max(1);
    let mut last_failure = String::new();
    for attempt in 1..=attempts {
        match produce(attempt).await {
            Ok(raw) => match parse_gist(&raw) {
                Ok(gist) => {
                    debug!("Gist parsed on attempt {}/{}", attempt, attempts);
                    return Ok(gist);
                }
                Err(detail) => {
                    warn!("Formatter attempt {}/{}: {}", attempt, attempts, detail);
                    last_failure = detail;
                }
            },
            Err(e) => {
                warn!("Formatter attempt {}/{}: {}", attempt, attempts, e);
                last_failure = e.to_string();
            }
        }
    }
    Err(GistError::SchemaViolation {
        attempts,
        detail: last_failure,
    })
}

/// Produces gists for papers.
pub struct GistGenerator {
    /// `None` in single-stage mode.
    summarizer: Option<Summarizer>,
    formatter: Arc<dyn ChatModel>,
    links: LinkChecker,
    max_attempts: u32,
    span: Span,
}

impl GistGenerator {
    pub fn two_stage(summarizer: Summarizer, formatter: Arc<dyn ChatModel>, links: LinkChecker) -> Self {
        Self {
            summarizer: Some(summarizer),
            formatter,
            links,
            max_attempts: 5,
            span: tracing::info_span!("gist"),
        }
    }

    pub fn single_stage(formatter: Arc<dyn ChatModel>, links: LinkChecker) -> Self {
        Self {
            summarizer: None,
            formatter,
            links,
            max_attempts: 5,
            span: tracing::info_span!("gist"),
        }
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn mode(&self) -> GistMode {
        if self.summarizer.is_some() {
            GistMode::TwoStage
        } else {
            GistMode::SingleStage
        }
    }

    /// Build the generator described by `config`.
    ///
    /// Pre-built models in the config take precedence over the provider
    /// settings.
    pub fn from_config(config: &DigestConfig) -> Result<Self, DigestError> {
        let formatter = match &config.formatter {
            Some(model) => Arc::clone(model),
            None => provider_model(
                &config.provider_name,
                &config.formatter_model,
                &config.ollama_base_url,
                Some(config.formatter_temperature),
                config.formatter_max_tokens,
            )?,
        };
        let links = LinkChecker::new(Duration::from_secs(config.link_check_timeout_secs))?;

        let generator = match config.mode {
            GistMode::SingleStage => Self::single_stage(formatter, links),
            GistMode::TwoStage => {
                let model = match &config.summarizer {
                    Some(model) => Arc::clone(model),
                    None => provider_model(
                        &config.provider_name,
                        &config.summarizer_model,
                        &config.ollama_base_url,
                        None,
                        config.summarizer_max_tokens,
                    )?,
                };
                let summarizer = if config.summarizer_as_agent {
                    Summarizer::Agent(AgentSummarizer::with_default_tools(
                        model,
                        config.agent_max_steps,
                        Duration::from_secs(config.tool_timeout_secs),
                    )?)
                } else {
                    Summarizer::Plain(model)
                };
                Self::two_stage(summarizer, formatter, links)
            }
        };
        Ok(generator.with_max_attempts(config.formatter_max_attempts))
    }

    /// Gist for one paper. `paper_url` is used to reject self-references.
    pub async fn summarize(
        &self,
        title: &str,
        abstract_text: &str,
        paper_url: &str,
    ) -> Result<Gist, GistError> {
        async {
            let prompt = match &self.summarizer {
                Some(summarizer) => {
                    info!("Summarizing \"{}\" with {}", title, summarizer.name());
                    let reasoning = summarizer
                        .summarize(&summary_prompt(title, abstract_text))
                        .await?;
                    let reasoning = strip_think_tags(&reasoning);
                    debug!("Reasoning output: {}", reasoning);
                    format_prompt(&reasoning)
                }
                None => direct_gist_prompt(title, abstract_text),
            };

            info!("Formatting gist with {}", self.formatter.name());
            let turns = [Turn::user(prompt)];
            let turns = &turns[..];
            let formatter = &self.formatter;
            let mut gist = parse_or_retry(self.max_attempts, move |_| formatter.chat(turns)).await?;

            let references = std::mem::take(&mut gist.reference_urls);
            gist.reference_urls = self.links.filter(references, paper_url).await;
            Ok(gist)
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::testing::ScriptedModel;
    use std::sync::atomic::{AtomicU32, Ordering};

    const GOOD: &str = r#"{"about": "Studies X.", "objective": "Do Y.", "novelty": "First Z.", "key": "W works."}"#;

    fn checker() -> LinkChecker {
        LinkChecker::new(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn parse_gist_cleans_fields() {
        let raw = "```json\n{\"about\": \"line one\\nline two\", \"objective\": \"o\", \"novelty\": \"n\", \"key\": \"k\"}\n```";
        let gist = parse_gist(raw).unwrap();
        assert_eq!(gist.about, "line one line two");
        assert!(gist.reference_urls.is_empty());
    }

    #[test]
    fn parse_gist_rejects_missing_and_empty_fields() {
        let missing = r#"{"about": "a", "objective": "o", "novelty": "n"}"#;
        assert!(parse_gist(missing).unwrap_err().contains("key"));
        let empty = r#"{"about": "a", "objective": "  ", "novelty": "n", "key": "k"}"#;
        assert!(parse_gist(empty).is_err());
        assert!(parse_gist("no json at all").is_err());
    }

    #[test]
    fn parse_gist_accepts_null_references() {
        let raw = r#"{"about": "a", "objective": "o", "novelty": "n", "key": "k", "reference_urls": null}"#;
        let gist = parse_gist(raw).unwrap();
        assert!(gist.reference_urls.is_empty());
    }

    #[test]
    fn parse_gist_drops_malformed_reference_entries() {
        let raw = r#"{
          "about": "a", "objective": "o", "novelty": "n", "key": "k",
          "reference_urls": [
            {"url": "https://en.wikipedia.org/wiki/X"},
            "https://en.wikipedia.org/wiki/Y",
            {"url": "  ", "text": "blank"},
            {"url": " https://en.wikipedia.org/wiki/Z ", "text": "Z\nlink"}
          ]
        }"#;
        let gist = parse_gist(raw).unwrap();
        assert_eq!(
            gist.reference_urls,
            vec![ReferenceUrl {
                url: "https://en.wikipedia.org/wiki/Z".into(),
                text: "Z link".into(),
            }]
        );
    }

    #[test]
    fn parse_gist_ignores_non_list_references() {
        let raw = r#"{"about": "a", "objective": "o", "novelty": "n", "key": "k", "reference_urls": "x"}"#;
        assert!(parse_gist(raw).unwrap().reference_urls.is_empty());
    }

    #[tokio::test]
    async fn parse_or_retry_succeeds_on_last_attempt() {
        let calls = AtomicU32::new(0);
        let gist = parse_or_retry(5, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 5 {
                    Ok("not json".to_string())
                } else {
                    Ok(GOOD.to_string())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(gist.key, "W works.");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn parse_or_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = parse_or_retry(5, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(r#"{"about": "only"}"#.to_string()) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, GistError::SchemaViolation { attempts: 5, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn parse_or_retry_retries_model_errors() {
        let err = parse_or_retry(3, |_| async {
            Err::<String, _>(GistError::ModelCallFailed {
                model: "m".into(),
                detail: "connection refused".into(),
            })
        })
        .await
        .unwrap_err();
        match err {
            GistError::SchemaViolation { attempts, detail } => {
                assert_eq!(attempts, 3);
                assert!(detail.contains("connection refused"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_stage_strips_reasoning_before_formatting() {
        let summarizer = Arc::new(ScriptedModel::ok(
            "summarizer",
            &["<think>scratch work</think>The paper proposes a robot."],
        ));
        let formatter = Arc::new(ScriptedModel::ok("formatter", &["oops", GOOD]));
        let generator = GistGenerator::two_stage(
            Summarizer::Plain(summarizer.clone()),
            formatter.clone(),
            checker(),
        );
        assert_eq!(generator.mode(), GistMode::TwoStage);

        let gist = generator
            .summarize("Robots", "We build robots.", "http://arxiv.org/abs/1")
            .await
            .unwrap();
        assert_eq!(gist.about, "Studies X.");

        let summary_turns = &summarizer.calls.lock().unwrap()[0];
        assert!(summary_turns[0].content.contains("title: Robots"));

        let format_calls = formatter.calls.lock().unwrap();
        assert_eq!(format_calls.len(), 2);
        let prompt = &format_calls[1][0].content;
        assert!(prompt.contains("The paper proposes a robot."));
        assert!(!prompt.contains("scratch work"));
    }

    #[tokio::test]
    async fn summarizer_failure_is_not_retried() {
        let summarizer = Arc::new(ScriptedModel::new(
            "summarizer",
            vec![Err(GistError::ModelCallFailed {
                model: "summarizer".into(),
                detail: "down".into(),
            })],
        ));
        let formatter = Arc::new(ScriptedModel::ok("formatter", &[GOOD]));
        let generator = GistGenerator::two_stage(
            Summarizer::Plain(summarizer.clone()),
            formatter.clone(),
            checker(),
        );
        let err = generator.summarize("T", "A", "u").await.unwrap_err();
        assert!(matches!(err, GistError::ModelCallFailed { .. }));
        assert_eq!(summarizer.call_count(), 1);
        assert_eq!(formatter.call_count(), 0);
    }

    #[tokio::test]
    async fn single_stage_asks_formatter_directly() {
        let formatter = Arc::new(ScriptedModel::ok("formatter", &[GOOD]));
        let generator = GistGenerator::single_stage(formatter.clone(), checker());
        assert_eq!(generator.mode(), GistMode::SingleStage);
        generator.summarize("Title", "Abstract", "u").await.unwrap();
        let prompt = &formatter.calls.lock().unwrap()[0][0].content;
        assert!(prompt.contains("title: Title"));
        assert!(prompt.contains("[JSON Schema]"));
    }

    #[tokio::test]
    async fn agent_summarizer_is_used_in_two_stage_mode() {
        let agent_model = Arc::new(ScriptedModel::ok("agent", &["Plain prose answer."]));
        let formatter = Arc::new(ScriptedModel::ok("formatter", &[GOOD]));
        let generator = GistGenerator::two_stage(
            Summarizer::Agent(AgentSummarizer::new(agent_model.clone(), vec![], 2)),
            formatter.clone(),
            checker(),
        );
        generator.summarize("T", "A", "u").await.unwrap();
        assert_eq!(agent_model.call_count(), 1);
        assert!(formatter.calls.lock().unwrap()[0][0]
            .content
            .contains("Plain prose answer."));
    }

    #[tokio::test]
    async fn references_are_filtered() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/wiki")
            .with_status(200)
            .create_async()
            .await;
        let _gone = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;
        let reply = serde_json::json!({
            "about": "a", "objective": "o", "novelty": "n", "key": "k",
            "reference_urls": [
                {"url": "http://example.com/x", "text": "fake"},
                {"url": format!("{}/gone", server.url()), "text": "gone"},
                {"url": format!("{}/wiki", server.url()), "text": "wiki"},
            ]
        })
        .to_string();
        let formatter = Arc::new(ScriptedModel::new("formatter", vec![Ok(reply)]));
        let generator = GistGenerator::single_stage(formatter, checker());
        let gist = generator.summarize("T", "A", "http://arxiv.org/abs/1").await.unwrap();
        assert_eq!(gist.reference_urls.len(), 1);
        assert_eq!(gist.reference_urls[0].text, "wiki");
    }

    #[test]
    fn from_config_uses_prebuilt_models() {
        let config = DigestConfig::builder()
            .summarizer(Arc::new(ScriptedModel::ok("s", &[])))
            .formatter(Arc::new(ScriptedModel::ok("f", &[])))
            .summarizer_as_agent(true)
            .formatter_max_attempts(3)
            .build()
            .unwrap();
        let generator = GistGenerator::from_config(&config).unwrap();
        assert_eq!(generator.mode(), GistMode::TwoStage);
        assert_eq!(generator.max_attempts, 3);
        assert!(matches!(generator.summarizer, Some(Summarizer::Agent(_))));
    }
}
