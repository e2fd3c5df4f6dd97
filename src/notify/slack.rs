//! Minimal Slack Web API client: messages and external file uploads.

use crate::config::NotifyConfig;
use crate::error::DigestError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Body of `chat.postMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrkdwn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct UploadTicket {
    upload_url: String,
    file_id: String,
}

/// Authenticated client for one workspace.
#[derive(Debug, Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Check the HTTP status and the `ok` flag of a response.
    async fn read(method: &str, response: reqwest::Response) -> Result<Value, DigestError> {
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::slack(method, format!("HTTP {status}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| DigestError::slack(method, e.to_string()))?;
        if body["ok"].as_bool() == Some(true) {
            Ok(body)
        } else {
            let error = body["error"].as_str().unwrap_or("unknown_error");
            Err(DigestError::slack(method, error))
        }
    }

    async fn call_json(&self, method: &str, payload: &impl Serialize) -> Result<Value, DigestError> {
        debug!("Slack {}", method);
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(|e| DigestError::slack(method, e.to_string()))?;
        Self::read(method, response).await
    }

    async fn call_form(&self, method: &str, form: &[(&str, String)]) -> Result<Value, DigestError> {
        debug!("Slack {}", method);
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await
            .map_err(|e| DigestError::slack(method, e.to_string()))?;
        Self::read(method, response).await
    }

    /// Post a message and return its `ts`.
    pub async fn post_message(&self, message: &PostMessage) -> Result<String, DigestError> {
        let body = self.call_json("chat.postMessage", message).await?;
        Ok(body["ts"].as_str().unwrap_or_default().to_string())
    }

    /// Upload `bytes` as `filename` and return the file id.
    pub async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String, DigestError> {
        let ticket = self
            .call_form(
                "files.getUploadURLExternal",
                &[("filename", filename.to_string()), ("length", bytes.len().to_string())],
            )
            .await?;
        let ticket: UploadTicket = serde_json::from_value(ticket)
            .map_err(|e| DigestError::slack("files.getUploadURLExternal", e.to_string()))?;

        let response = self
            .client
            .post(&ticket.upload_url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DigestError::slack("upload", e.to_string()))?;
        if !response.status().is_success() {
            return Err(DigestError::slack("upload", format!("HTTP {}", response.status())));
        }

        self.call_json(
            "files.completeUploadExternal",
            &json!({"files": [{"id": ticket.file_id, "title": filename}]}),
        )
        .await?;
        Ok(ticket.file_id)
    }
}
