//! Language-model capabilities: query rephrasing and grounded answering.
//!
//! One chat-completions client (OpenAI-compatible wire format, which covers
//! Groq and OpenAI backends) serves two thin adapters:
//!
//! - [`LlmRephraser`] rewrites a user message into a retrieval-friendly
//!   query. Short, shorthand, or misspelled input frequently misses direct
//!   nearest-neighbor retrieval; a single rewrite recovers most of it.
//! - [`GroundedGenerator`] composes an answer constrained to the supplied
//!   knowledge passages.
//!
//! API keys come from the environment (`GROQ_API_KEY` / `OPENAI_API_KEY`),
//! checked when the client is constructed. Adapters are single-shot; the
//! pipeline owns the retry budget.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::message::FALLBACK_CONTACT;

/// Rewrites a message into a retrieval-optimized query.
#[async_trait]
pub trait QueryRephraser: Send + Sync {
    async fn rewrite(&self, query: &str) -> Result<String>;
}

/// Generates an answer grounded in the supplied passages.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, passages: &[String]) -> Result<String>;
}

/// Chat-completions client for OpenAI-compatible APIs.
pub struct ChatClient {
    url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's API key environment variable is
    /// not set, or for an unknown provider name.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let (key_var, default_url) = match config.provider.as_str() {
            "groq" => ("GROQ_API_KEY", "https://api.groq.com/openai/v1"),
            "openai" => ("OPENAI_API_KEY", "https://api.openai.com/v1"),
            other => bail!("Unknown llm provider: {}", other),
        };

        let api_key = std::env::var(key_var)
            .map_err(|_| anyhow!("{} environment variable not set", key_var))?;

        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(default_url)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    /// Run one chat completion and return the assistant text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("LLM connection error ({}): {}", self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("LLM API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Invalid completion response: missing message content"))?;

    Ok(content.to_string())
}

// ============ Rephraser ============

const REPHRASE_SYSTEM_PROMPT: &str = "You rewrite customer questions into clear, \
    self-contained search queries for a knowledge base. Fix spelling, expand \
    shorthand, and keep the original intent and language. Reply with the \
    rewritten query only, no explanations, no quotes.";

/// [`QueryRephraser`] backed by a [`ChatClient`].
pub struct LlmRephraser {
    client: Arc<ChatClient>,
}

impl LlmRephraser {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryRephraser for LlmRephraser {
    async fn rewrite(&self, query: &str) -> Result<String> {
        let rewritten = self.client.complete(REPHRASE_SYSTEM_PROMPT, query).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            bail!("Rephraser returned empty output");
        }
        Ok(rewritten.to_string())
    }
}

// ============ Generator ============

/// [`AnswerGenerator`] backed by a [`ChatClient`].
///
/// The system prompt carries the grounding contract: answer only from the
/// knowledge section, fall back to the fixed contact sentence when the
/// knowledge does not contain the answer, mirror the customer's language
/// and register, keep domain terms unmodified, at most one decorative
/// symbol per reply.
pub struct GroundedGenerator {
    client: Arc<ChatClient>,
}

impl GroundedGenerator {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }

    fn system_prompt() -> String {
        format!(
            "You are a helpful assistant that answers customer questions based on \
             provided knowledge. You rely solely on the information in the knowledge \
             section. Answer naturally without mentioning that you're using provided \
             knowledge. If the knowledge does not contain the answer, reply exactly: \
             \"{}\" If the message is purely a greeting, greet politely instead. \
             Reply in the same language and register as the question. Keep \
             domain-specific terms unmodified. Use at most one decorative symbol \
             per reply.",
            FALLBACK_CONTACT
        )
    }

    fn user_prompt(query: &str, passages: &[String]) -> String {
        let knowledge = passages.join("\n\n");
        format!(
            "Based on the following knowledge, please answer the question.\n\n\
             Knowledge:\n{}\n\nQuestion: {}",
            knowledge, query
        )
    }
}

#[async_trait]
impl AnswerGenerator for GroundedGenerator {
    async fn generate(&self, query: &str, passages: &[String]) -> Result<String> {
        let system = Self::system_prompt();
        let user = Self::user_prompt(query, passages);
        self.client.complete(&system, &user).await
    }
}

// ============ Factories ============

/// Create both LLM capabilities over one shared client.
pub fn create_llm(config: &LlmConfig) -> Result<(Arc<dyn QueryRephraser>, Arc<dyn AnswerGenerator>)> {
    let client = Arc::new(ChatClient::new(config)?);
    Ok((
        Arc::new(LlmRephraser::new(client.clone())),
        Arc::new(GroundedGenerator::new(client)),
    ))
}
