//! Tool-using summarizer.
//!
//! The agent talks to its model through a plain-text protocol so it works on
//! any provider, including small local models without native function calling:
//!
//! ```text
//! model ──▶ "Action: web_search\nInput: diffusion policy"
//!   ▲                                   │
//!   └──── "Observation: [...]" ◀── tool ┘
//! ```
//!
//! The loop ends when a reply carries no `Action:` line; that reply is the
//! summary. After `max_steps` tool calls the model is told to answer.

use crate::error::{DigestError, GistError};
use crate::pipeline::llm::{ChatModel, Turn};
use crate::pipeline::postprocess::{collapse_whitespace, html_to_text, strip_think_tags};
use crate::prompts::{agent_system_prompt, AGENT_BUDGET_EXHAUSTED, AGENT_SUFFIX};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest observation handed back to the model, in characters.
const MAX_OBSERVATION_CHARS: usize = 8000;

/// Results returned by one web search.
const MAX_SEARCH_RESULTS: usize = 5;

/// Something the agent can call with a single string argument.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run the tool. Failures are reported in the returned text, never as
    /// errors, so the model can react to them.
    async fn call(&self, input: &str) -> String;
}

// ── ReAct parsing ────────────────────────────────────────────────────────────

static RE_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*Action:[ \t]*([A-Za-z_]+)[ \t]*\r?\n[ \t]*Input:[ \t]*(.+?)[ \t]*$")
        .unwrap()
});

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub tool: String,
    pub input: String,
}

/// Find the first `Action:` / `Input:` pair in a reply.
pub fn parse_action(reply: &str) -> Option<Action> {
    RE_ACTION.captures(reply).map(|caps| Action {
        tool: caps[1].to_string(),
        input: caps[2].trim().to_string(),
    })
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max).collect();
        cut.push_str(" …[truncated]");
        cut
    }
}

// ── Agent ────────────────────────────────────────────────────────────────────

/// Summarizer that may consult tools before writing prose.
pub struct AgentSummarizer {
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    max_steps: usize,
}

impl AgentSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>, max_steps: usize) -> Self {
        Self {
            model,
            tools,
            max_steps,
        }
    }

    /// Agent with the standard `web_search` and `fetch_url` tools.
    pub fn with_default_tools(
        model: Arc<dyn ChatModel>,
        max_steps: usize,
        timeout: Duration,
    ) -> Result<Self, DigestError> {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(WebSearch::new(timeout)?),
            Arc::new(FetchUrl::new(timeout)?),
        ];
        Ok(Self::new(model, tools, max_steps))
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Run the tool loop for `prompt` and return the final reply.
    pub async fn summarize(&self, prompt: &str) -> Result<String, GistError> {
        let listing: Vec<(&str, &str)> = self
            .tools
            .iter()
            .map(|t| (t.name(), t.description()))
            .collect();
        let mut turns = vec![
            Turn::system(agent_system_prompt(&listing)),
            Turn::user(format!("{prompt}{AGENT_SUFFIX}")),
        ];

        let mut calls = 0usize;
        loop {
            let reply = self.model.chat(&turns).await?;
            let Some(action) = parse_action(&strip_think_tags(&reply)) else {
                debug!("Agent finished after {} tool calls", calls);
                return Ok(reply);
            };
            turns.push(Turn::assistant(reply));

            if calls >= self.max_steps {
                warn!(
                    "Agent asked for {} after {} tool calls; forcing an answer",
                    action.tool, calls
                );
                turns.push(Turn::user(AGENT_BUDGET_EXHAUSTED));
                return self.model.chat(&turns).await;
            }
            calls += 1;

            let observation = self.run_tool(&action).await;
            turns.push(Turn::user(format!(
                "Observation: {}",
                truncate_chars(&observation, MAX_OBSERVATION_CHARS)
            )));
        }
    }

    async fn run_tool(&self, action: &Action) -> String {
        match self.tools.iter().find(|t| t.name() == action.tool) {
            Some(tool) => {
                info!("Agent tool call: {}({})", action.tool, action.input);
                tool.call(&action.input).await
            }
            None => {
                warn!("Agent requested unknown tool '{}'", action.tool);
                let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
                format!(
                    "Unknown tool '{}'. Available tools: {}",
                    action.tool,
                    names.join(", ")
                )
            }
        }
    }
}

// ── Tools ────────────────────────────────────────────────────────────────────

fn http_client(timeout: Duration) -> Result<reqwest::Client, DigestError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("paper-gist/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DigestError::Internal(format!("HTTP client for agent tools: {e}")))
}

fn failure(e: &reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "Timeout"
    } else if e.is_connect() {
        "ConnectionError"
    } else if e.is_status() {
        "HTTPError"
    } else {
        "RequestError"
    };
    format!("FAILED TO FETCH CONTENT: {kind}: {e}")
}

/// Retrieve the content at a URL; HTML is reduced to visible text.
pub struct FetchUrl {
    client: reqwest::Client,
}

impl FetchUrl {
    pub fn new(timeout: Duration) -> Result<Self, DigestError> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Tool for FetchUrl {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Retrieve raw content from a specific URL. Input must be a full http:// or https:// URL, not a search query. Only retrieves the exact URL content; does not execute JavaScript."
    }

    async fn call(&self, input: &str) -> String {
        let url = input.trim().trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>');
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return failure(&e),
        };
        let response = match response.error_for_status() {
            Ok(r) => r,
            Err(e) => return failure(&e),
        };
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false);
        match response.text().await {
            Ok(body) if is_html => html_to_text(&body),
            Ok(body) => body,
            Err(e) => failure(&e),
        }
    }
}

/// One web search hit, serialised for the model as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Web search through DuckDuckGo's HTML endpoint.
pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearch {
    pub fn new(timeout: Duration) -> Result<Self, DigestError> {
        Self::with_endpoint(timeout, "https://html.duckduckgo.com/html/")
    }

    pub fn with_endpoint(timeout: Duration, endpoint: impl Into<String>) -> Result<Self, DigestError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Input is a search query. Returns a JSON list of results with title, link and snippet."
    }

    async fn call(&self, input: &str) -> String {
        let query = input.trim().trim_matches('"');
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let html = match response {
            Ok(r) => match r.text().await {
                Ok(t) => t,
                Err(e) => return failure(&e),
            },
            Err(e) => return failure(&e),
        };
        let hits = parse_search_results(&html);
        debug!("web_search '{}' → {} hits", query, hits.len());
        serde_json::to_string(&hits).unwrap_or_else(|_| "[]".to_string())
    }
}

static RE_RESULT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<a\b([^>]*\bclass="result__a"[^>]*)>(.*?)</a>"#).unwrap());
static RE_RESULT_SNIPPET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<a\b[^>]*\bclass="result__snippet"[^>]*>(.*?)</a>"#).unwrap());
static RE_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bhref="([^"]*)""#).unwrap());

/// Extract hits from a DuckDuckGo HTML results page.
pub fn parse_search_results(html: &str) -> Vec<SearchHit> {
    let snippets: Vec<String> = RE_RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| html_to_text(&c[1]))
        .collect();

    RE_RESULT_LINK
        .captures_iter(html)
        .enumerate()
        .filter_map(|(i, caps)| {
            let href = RE_HREF.captures(&caps[1])?.get(1)?.as_str().replace("&amp;", "&");
            Some(SearchHit {
                title: collapse_whitespace(&html_to_text(&caps[2])),
                link: resolve_result_link(&href),
                snippet: snippets.get(i).cloned().unwrap_or_default(),
            })
        })
        .take(MAX_SEARCH_RESULTS)
        .collect()
}

/// Unwrap DuckDuckGo's `/l/?uddg=<target>` redirect links.
fn resolve_result_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::testing::ScriptedModel;
    use crate::pipeline::llm::Role;
    use std::sync::Mutex;

    struct EchoTool {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "echo"
        }

        async fn call(&self, input: &str) -> String {
            self.seen.lock().unwrap().push(input.to_string());
            format!("results for {input}")
        }
    }

    #[test]
    fn parse_action_finds_tool_call() {
        let reply = "I should look this up.\nAction: web_search\nInput: diffusion policy robotics\n";
        assert_eq!(
            parse_action(reply),
            Some(Action {
                tool: "web_search".into(),
                input: "diffusion policy robotics".into(),
            })
        );
    }

    #[test]
    fn parse_action_ignores_final_answers() {
        assert_eq!(parse_action("[About] The paper studies X.\n[Key] Y."), None);
    }

    #[test]
    fn truncate_long_observations() {
        let long = "x".repeat(20);
        assert_eq!(truncate_chars(&long, 5), "xxxxx …[truncated]");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn agent_runs_tools_until_final_answer() {
        let model = Arc::new(ScriptedModel::ok(
            "agent",
            &[
                "<think>hmm</think>Action: web_search\nInput: LoRA",
                "The paper fine-tunes with LoRA.",
            ],
        ));
        let tool = Arc::new(EchoTool {
            seen: Mutex::new(Vec::new()),
        });
        let agent = AgentSummarizer::new(model.clone(), vec![tool.clone()], 3);

        let out = agent.summarize("Summarise.").await.unwrap();
        assert_eq!(out, "The paper fine-tunes with LoRA.");
        assert_eq!(*tool.seen.lock().unwrap(), vec!["LoRA".to_string()]);

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[0][1].content.ends_with(AGENT_SUFFIX));
        let last = calls[1].last().unwrap();
        assert_eq!(last.content, "Observation: results for LoRA");
    }

    #[tokio::test]
    async fn agent_is_forced_to_answer_after_budget() {
        let model = Arc::new(ScriptedModel::ok(
            "agent",
            &[
                "Action: web_search\nInput: a",
                "Action: web_search\nInput: b",
                "Final summary.",
            ],
        ));
        let tool = Arc::new(EchoTool {
            seen: Mutex::new(Vec::new()),
        });
        let agent = AgentSummarizer::new(model.clone(), vec![tool.clone()], 1);

        let out = agent.summarize("Summarise.").await.unwrap();
        assert_eq!(out, "Final summary.");
        assert_eq!(tool.seen.lock().unwrap().len(), 1);
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[2].last().unwrap().content, AGENT_BUDGET_EXHAUSTED);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let model = Arc::new(ScriptedModel::ok(
            "agent",
            &["Action: calculator\nInput: 1+1", "Done."],
        ));
        let agent = AgentSummarizer::new(model.clone(), vec![], 2);
        agent.summarize("p").await.unwrap();
        let calls = model.calls.lock().unwrap();
        assert!(calls[1]
            .last()
            .unwrap()
            .content
            .contains("Unknown tool 'calculator'"));
    }

    #[test]
    fn parse_duckduckgo_results() {
        let html = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FLoRA&amp;rut=abc">Low-rank <b>adaptation</b></a>
  <a class="result__snippet" href="x">LoRA freezes the <b>pretrained</b> weights.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://direct.test/page">Direct</a>
  <a class="result__snippet" href="y"><b>Second</b> snippet, <b>two</b> highlights.</a>
</div>"#;
        let hits = parse_search_results(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Low-rank adaptation");
        assert_eq!(hits[0].link, "https://en.wikipedia.org/wiki/LoRA");
        assert_eq!(hits[0].snippet, "LoRA freezes the pretrained weights.");
        assert_eq!(hits[1].link, "https://direct.test/page");
        assert_eq!(hits[1].snippet, "Second snippet, two highlights.");
    }

    #[tokio::test]
    async fn fetch_url_reduces_html() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/article")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><script>x()</script><p>Hello   <b>world</b></p></html>")
            .create_async()
            .await;
        let tool = FetchUrl::new(Duration::from_secs(5)).unwrap();
        let out = tool.call(&format!("{}/article", server.url())).await;
        assert_eq!(out, "Hello world");
    }

    #[tokio::test]
    async fn fetch_url_reports_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone")
            .with_status(500)
            .create_async()
            .await;
        let tool = FetchUrl::new(Duration::from_secs(5)).unwrap();
        let out = tool.call(&format!("\"{}/gone\"", server.url())).await;
        assert!(out.starts_with("FAILED TO FETCH CONTENT: HTTPError:"), "{out}");
    }

    #[tokio::test]
    async fn web_search_queries_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/html/")
            .match_query(mockito::Matcher::UrlEncoded("q".into(), "graph neural network".into()))
            .with_status(200)
            .with_body(r#"<a class="result__a" href="https://gnn.test/">GNN</a><a class="result__snippet">s</a>"#)
            .create_async()
            .await;
        let tool = WebSearch::with_endpoint(Duration::from_secs(5), format!("{}/html/", server.url())).unwrap();
        let out = tool.call("graph neural network").await;
        m.assert_async().await;
        let hits: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(hits[0]["link"], "https://gnn.test/");
        assert_eq!(hits[0]["snippet"], "s");
    }
}
