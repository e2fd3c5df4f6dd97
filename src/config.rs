//! Configuration types for the fetch and notify steps.
//!
//! The fetch step is controlled through [`DigestConfig`], built via its
//! [`DigestConfigBuilder`]; the notify step through [`NotifyConfig`]. Every
//! knob has a documented default, so callers set only what they care about.

use crate::error::DigestError;
use crate::pipeline::llm::ChatModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// arXiv subject codes accepted by both binaries (CS and EESS groups).
pub const ARXIV_CATEGORIES: &[&str] = &[
    "cs.AR", "cs.AI", "cs.CC", "cs.CE", "cs.CG", "cs.CL", "cs.CR", "cs.CV", "cs.CY", "cs.DB",
    "cs.DC", "cs.DL", "cs.DM", "cs.DS", "cs.ET", "cs.FL", "cs.GL", "cs.GR", "cs.GT", "cs.HC",
    "cs.IR", "cs.IT", "cs.LG", "cs.LO", "cs.MA", "cs.MM", "cs.MS", "cs.NA", "cs.NE", "cs.NI",
    "cs.OH", "cs.OS", "cs.PF", "cs.PL", "cs.RO", "cs.SC", "cs.SD", "cs.SE", "cs.SI", "cs.SY",
    "eess.AS", "eess.IV", "eess.SP", "eess.SY",
];

/// Whether `code` is one of [`ARXIV_CATEGORIES`].
pub fn is_known_category(code: &str) -> bool {
    ARXIV_CATEGORIES.contains(&code)
}

/// Path of the persisted batch for `category` inside `data_dir`.
pub fn batch_path(data_dir: &Path, category: &str) -> PathBuf {
    data_dir.join(format!("papers-{category}.json"))
}

/// How the gist is produced from a paper's title and abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GistMode {
    /// One formatter call turns the paper straight into JSON.
    SingleStage,
    /// A free-form summarizer pass, then a formatter pass into JSON. (default)
    #[default]
    TwoStage,
}

/// Configuration for the fetch step.
///
/// # Example
/// ```rust
/// use paper_gist::{DigestConfig, GistMode};
///
/// let config = DigestConfig::builder()
///     .max_papers(5)
///     .summarizer_model("qwen3:8b")
///     .mode(GistMode::SingleStage)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_papers, 5);
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Directory holding `papers-{category}.json` and `images/`. Default: `./data`.
    pub data_dir: PathBuf,

    /// Papers kept after the day filter. Default: 20.
    pub max_papers: usize,

    /// Newest feed entries requested before filtering locally. Default: 80.
    ///
    /// The feed cannot filter by submission day, so we over-fetch and cut.
    pub feed_fetch_size: usize,

    /// arXiv API endpoint. Default: `http://export.arxiv.org/api/query`.
    pub feed_url: String,

    /// edgequake-llm provider name. Default: `ollama`.
    pub provider_name: String,

    /// Ollama endpoint, exported as `OLLAMA_HOST` when the provider is ollama.
    pub ollama_base_url: String,

    /// Model for the free-form reasoning pass. Default: `qwen3:8b`.
    pub summarizer_model: String,

    /// Equip the summarizer with `web_search` / `fetch_url` tools. Default: false.
    pub summarizer_as_agent: bool,

    /// Model for the JSON formatting pass. Default: `gemma3:4b`.
    pub formatter_model: String,

    /// Single- or two-stage gist generation. Default: two-stage.
    pub mode: GistMode,

    /// Output budget of the reasoning pass. Default: 3072.
    ///
    /// Reasoning models spend much of it inside `<think>` before answering.
    pub summarizer_max_tokens: usize,

    /// Output budget of the formatter pass. Default: 1024.
    pub formatter_max_tokens: usize,

    /// Formatter sampling temperature. Default: 0.1.
    pub formatter_temperature: f32,

    /// Formatter attempts before a paper is given up on. Default: 5.
    pub formatter_max_attempts: u32,

    /// Tool calls the agent may make before it must answer. Default: 6.
    pub agent_max_steps: usize,

    /// Timeout of a single reference-URL check in seconds. Default: 5.
    pub link_check_timeout_secs: u64,

    /// Timeout of the `fetch_url` / `web_search` tools in seconds. Default: 10.
    pub tool_timeout_secs: u64,

    /// PDF download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-built summarizer model. Takes precedence over `summarizer_model`.
    pub summarizer: Option<Arc<dyn ChatModel>>,

    /// Pre-built formatter model. Takes precedence over `formatter_model`.
    pub formatter: Option<Arc<dyn ChatModel>>,

    /// Per-paper progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_papers: 20,
            feed_fetch_size: 80,
            feed_url: "http://export.arxiv.org/api/query".to_string(),
            provider_name: "ollama".to_string(),
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            summarizer_model: "qwen3:8b".to_string(),
            summarizer_as_agent: false,
            formatter_model: "gemma3:4b".to_string(),
            mode: GistMode::default(),
            summarizer_max_tokens: 3072,
            formatter_max_tokens: 1024,
            formatter_temperature: 0.1,
            formatter_max_attempts: 5,
            agent_max_steps: 6,
            link_check_timeout_secs: 5,
            tool_timeout_secs: 10,
            download_timeout_secs: 120,
            summarizer: None,
            formatter: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("data_dir", &self.data_dir)
            .field("max_papers", &self.max_papers)
            .field("feed_fetch_size", &self.feed_fetch_size)
            .field("provider_name", &self.provider_name)
            .field("summarizer_model", &self.summarizer_model)
            .field("summarizer_as_agent", &self.summarizer_as_agent)
            .field("formatter_model", &self.formatter_model)
            .field("mode", &self.mode)
            .field("formatter_max_attempts", &self.formatter_max_attempts)
            .field("summarizer", &self.summarizer.as_ref().map(|_| "<dyn ChatModel>"))
            .field("formatter", &self.formatter.as_ref().map(|_| "<dyn ChatModel>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DigestProgressCallback>"),
            )
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory extracted figures are written to.
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Path of the batch file for `category`.
    pub fn batch_path(&self, category: &str) -> PathBuf {
        batch_path(&self.data_dir, category)
    }
}

/// Builder for [`DigestConfig`].
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl fmt::Debug for DigestConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl DigestConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn max_papers(mut self, n: usize) -> Self {
        self.config.max_papers = n;
        self
    }

    pub fn feed_fetch_size(mut self, n: usize) -> Self {
        self.config.feed_fetch_size = n;
        self
    }

    pub fn feed_url(mut self, url: impl Into<String>) -> Self {
        self.config.feed_url = url.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_base_url = url.into();
        self
    }

    pub fn summarizer_model(mut self, model: impl Into<String>) -> Self {
        self.config.summarizer_model = model.into();
        self
    }

    pub fn summarizer_as_agent(mut self, v: bool) -> Self {
        self.config.summarizer_as_agent = v;
        self
    }

    pub fn formatter_model(mut self, model: impl Into<String>) -> Self {
        self.config.formatter_model = model.into();
        self
    }

    pub fn mode(mut self, mode: GistMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn summarizer_max_tokens(mut self, n: usize) -> Self {
        self.config.summarizer_max_tokens = n;
        self
    }

    pub fn formatter_max_tokens(mut self, n: usize) -> Self {
        self.config.formatter_max_tokens = n;
        self
    }

    pub fn formatter_temperature(mut self, t: f32) -> Self {
        self.config.formatter_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn formatter_max_attempts(mut self, n: u32) -> Self {
        self.config.formatter_max_attempts = n;
        self
    }

    pub fn agent_max_steps(mut self, n: usize) -> Self {
        self.config.agent_max_steps = n;
        self
    }

    pub fn link_check_timeout_secs(mut self, secs: u64) -> Self {
        self.config.link_check_timeout_secs = secs;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn summarizer(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.config.summarizer = Some(model);
        self
    }

    pub fn formatter(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.config.formatter = Some(model);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        if c.max_papers == 0 {
            return Err(DigestError::InvalidConfig(
                "max papers must be ≥ 1".into(),
            ));
        }
        if c.feed_fetch_size == 0 {
            return Err(DigestError::InvalidConfig(
                "feed fetch size must be ≥ 1".into(),
            ));
        }
        if c.formatter_max_attempts == 0 {
            return Err(DigestError::InvalidConfig(
                "formatter attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for the notify step.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Slack bot token (`xoxb-…`).
    pub token: String,

    /// Slack Web API base URL. Default: `https://slack.com/api`.
    pub api_base_url: String,

    /// Wait after uploading an image. Default: 10 s.
    ///
    /// Slack rejects a `slack_file` block whose upload is still processing.
    pub upload_settle: Duration,

    /// Wait after each threaded message. Default: 1 s.
    pub thread_delay: Duration,
}

impl NotifyConfig {
    /// Defaults with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base_url: "https://slack.com/api".to_string(),
            upload_settle: Duration::from_secs(10),
            thread_delay: Duration::from_secs(1),
        }
    }

    /// Read the token from `SLACK_API_TOKEN`.
    pub fn from_env() -> Result<Self, DigestError> {
        match std::env::var("SLACK_API_TOKEN") {
            Ok(token) if !token.is_empty() => Ok(Self::new(token)),
            _ => Err(DigestError::MissingSlackToken),
        }
    }
}
