//! OpenAI-compatible chat completion reasoner

use super::{Answer, ExpectedShape, Reasoner};
use crate::config::LlmConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str =
    "You answer prediction market questions with a single token. No explanations.";

pub struct LlmReasoner {
    http: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl LlmReasoner {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, config })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(BotError::Transient(format!("LLM returned {status}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Api(format!("LLM returned {status}: {body}")));
        }

        let body: ChatResponse = resp.json().await?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn ask(&self, prompt: &str, shape: &ExpectedShape) -> Result<Answer> {
        let raw = self.complete(prompt).await?;
        let answer = shape.parse(&raw);
        debug!("LLM replied {:?} -> {:?}", raw, answer);
        Ok(answer)
    }
}
