//! Chat-completion transport for the scoring service.
//!
//! The `ChatApi` trait is the seam between the evaluator and the network:
//! production uses the bearer-authenticated HTTP client, tests inject a
//! scripted fake.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use curator_core::ChatMessage;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Evaluation-path failures the retry loop branches on.
#[derive(Debug)]
pub enum EvalError {
    /// Credentials rejected; never retried
    Auth(String),
    /// HTTP 429 from the scoring service
    RateLimited,
    /// Timeouts, connection failures, 5xx
    Transient(String),
    /// Response unusable after transport succeeded
    Parse(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Auth(msg) => write!(f, "authentication rejected: {msg}"),
            EvalError::RateLimited => write!(f, "rate limited by the scoring service"),
            EvalError::Transient(msg) => write!(f, "transient failure: {msg}"),
            EvalError::Parse(msg) => write!(f, "unusable response: {msg}"),
        }
    }
}

impl std::error::Error for EvalError {}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// One chat completion; returns `choices[0].message.content`.
    async fn chat(&self, request: ChatRequest) -> Result<String, EvalError>;
}

pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: &str) -> anyhow::Result<Self> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ChatApi for LlmClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, EvalError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EvalError::Transient(e.to_string()))?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => return Err(EvalError::Auth(format!("HTTP {status}"))),
            429 => return Err(EvalError::RateLimited),
            s if status.is_server_error() => {
                return Err(EvalError::Transient(format!("HTTP {s}")));
            }
            s if !status.is_success() => {
                return Err(EvalError::Transient(format!("HTTP {s}")));
            }
            _ => {}
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| EvalError::Parse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EvalError::Parse("response carried no choices".to_string()))
    }
}
