//! Chat-completion client used to condense a job posting into a summary.
//!
//! Every failure mode is a [`SummarizeError`] variant; callers treat all of
//! them the same way (skip the listing), but the variant is kept for logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarization request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("summarization endpoint returned HTTP {0}")]
    Status(u16),
    #[error("summarization response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("summarization response has no choices[0].message.content")]
    MissingCompletion,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, job_text: &str) -> Result<String, SummarizeError>;
}

/// Settings for an OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub instructions: String,
    pub timeout: Duration,
}

pub struct ChatSummarizer {
    http_client: reqwest::Client,
    config: ChatConfig,
}

impl ChatSummarizer {
    pub fn new(config: ChatConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, job_text: &str) -> Result<String, SummarizeError> {
        let request = ChatRequest::new(&self.config.model, &self.config.instructions, job_text);

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "summarization response");

        decode_completion(status, &body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, instructions: &str, job_text: &str) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{} \n {}", instructions, job_text),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Turn a raw endpoint response into the completion text.
fn decode_completion(status: StatusCode, body: &str) -> Result<String, SummarizeError> {
    if !status.is_success() {
        return Err(SummarizeError::Status(status.as_u16()));
    }

    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(SummarizeError::MissingCompletion)
}
