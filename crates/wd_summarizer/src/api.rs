use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wd_core::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MODEL: &str = "claude-sonnet-4-5-20250929";
const MAX_SUMMARY_TOKENS: u32 = 500;
const API_VERSION: &str = "2023-06-01";

/// Prompt body is truncated past this many characters.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 10_000;

/// USD per input token.
pub const INPUT_COST_PER_TOKEN: f64 = 3.0 / 1_000_000.0;
/// USD per output token.
pub const OUTPUT_COST_PER_TOKEN: f64 = 15.0 / 1_000_000.0;

/// Linear per-token pricing for one summarization call.
pub fn estimate_cost_usd(input_tokens: u64, output_tokens: u64) -> f64 {
    input_tokens as f64 * INPUT_COST_PER_TOKEN + output_tokens as f64 * OUTPUT_COST_PER_TOKEN
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Seam between the summarize stage and the model API.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: Option<&str>, content: &str) -> Result<Summary>;
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Summarization("ANTHROPIC_API_KEY is not configured".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Fixed summarization prompt: title plus the first 10,000 characters of
/// content, with an ellipsis marker past the cut.
pub fn build_prompt(title: Option<&str>, content: &str) -> String {
    let truncated: String = content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
    let marker = if content.chars().count() > MAX_PROMPT_CONTENT_CHARS {
        "..."
    } else {
        ""
    };
    format!(
        "Summarize the following article in 300 words or fewer.\n\n\
         Title: {}\n\n\
         Body:\n{}{}\n\n\
         Summary:",
        title.unwrap_or("Untitled"),
        truncated,
        marker
    )
}

#[async_trait]
impl Summarizer for AnthropicClient {
    async fn summarize(&self, title: Option<&str>, content: &str) -> Result<Summary> {
        let request = MessagesRequest {
            model: MODEL.to_string(),
            max_tokens: MAX_SUMMARY_TOKENS,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(title, content),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Summarization(format!(
                "API returned HTTP {}",
                response.status()
            )));
        }
        let body = response.json::<MessagesResponse>().await?;

        let first = body
            .content
            .first()
            .ok_or_else(|| Error::Summarization("empty response content".into()))?;
        if first.kind != "text" {
            return Err(Error::Summarization(format!(
                "unexpected response block: {}",
                first.kind
            )));
        }

        Ok(Summary {
            text: first.text.trim().to_string(),
            input_tokens: body.usage.input_tokens,
            output_tokens: body.usage.output_tokens,
        })
    }
}
