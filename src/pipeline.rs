//! The query-resolution pipeline.
//!
//! Single entry point [`QueryResolutionPipeline::resolve`]: takes a raw user
//! message and produces a [`PipelineOutcome`]. Decision procedure:
//!
//! ```text
//! message ──▶ empty? ──▶ EmptyInputReply
//!             greeting? ──▶ GreetingReply
//!             cache hit? ──▶ Answered (cached)
//!             ┌─ attempt loop (bounded, fixed delay) ─────────────┐
//!             │ retrieve ─ relevant? ──no─▶ rephrase ─ retrieve   │
//!             │                             high quality? ──no──▶ Fallback
//!             │ generate ─ non-empty? ──▶ cache ──▶ Answered      │
//!             │ error/empty ──▶ next attempt                      │
//!             └──────────────────────────────────────────────────┘
//!             exhausted ──▶ Failed
//! ```
//!
//! Rephrasing triggers only when an attempt's retrieval finds zero relevant
//! passages; a transient retriever error consumes an attempt, not a
//! rephrase. The generator always receives the original message (it carries
//! the user's language and register); the rephrased query is used only for
//! retrieval. Fallback outcomes are never cached.
//!
//! Cache faults are non-fatal: a failed lookup is a logged warning and a
//! miss, a failed write is a logged warning and the answer is still
//! returned.

use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{AnswerGenerator, QueryRephraser};
use crate::message::{
    self, EMPTY_INPUT_REPLY, FALLBACK_CONTACT, GREETING_REPLY,
};
use crate::models::{PipelineOutcome, RetrievalResult};
use crate::retriever::KnowledgeRetriever;

/// Tunables for one pipeline instance, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub relevance_threshold: f32,
    pub tag: Option<String>,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub cache_ttl: Duration,
    pub cache_namespace: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            relevance_threshold: config.retrieval.relevance_threshold,
            tag: config.retrieval.tag.clone(),
            max_attempts: config.pipeline.max_attempts,
            retry_delay: Duration::from_millis(config.pipeline.retry_delay_ms),
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            cache_namespace: config.cache.namespace.clone(),
        }
    }
}

/// Outcome of a single attempt inside the retry loop.
enum Attempt {
    /// Non-empty generated answer.
    Answer(String),
    /// Zero relevant passages even after rephrasing. Terminal.
    NoGrounding,
    /// The generator returned only whitespace. Retried.
    Empty,
}

/// Orchestrates retrieval, relevance gating, rephrasing, generation, and
/// caching. Holds no per-request state; safe to share across concurrent
/// requests behind an `Arc`.
pub struct QueryResolutionPipeline {
    retriever: Arc<dyn KnowledgeRetriever>,
    rephraser: Arc<dyn QueryRephraser>,
    generator: Arc<dyn AnswerGenerator>,
    cache: Arc<dyn ResponseCache>,
    settings: PipelineSettings,
}

impl QueryResolutionPipeline {
    pub fn new(
        retriever: Arc<dyn KnowledgeRetriever>,
        rephraser: Arc<dyn QueryRephraser>,
        generator: Arc<dyn AnswerGenerator>,
        cache: Arc<dyn ResponseCache>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            rephraser,
            generator,
            cache,
            settings,
        }
    }

    /// Resolve a raw user message into exactly one outcome.
    pub async fn resolve(&self, raw_message: &str) -> PipelineOutcome {
        let message = raw_message.trim();

        if message.is_empty() {
            debug!("empty message, returning clarification prompt");
            return PipelineOutcome::EmptyInputReply(EMPTY_INPUT_REPLY.to_string());
        }

        if message::is_greeting(message) {
            debug!("greeting detected, skipping retrieval and cache");
            return PipelineOutcome::GreetingReply(GREETING_REPLY.to_string());
        }

        let key = message::normalized_key(&self.settings.cache_namespace, message);
        match self.cache.get(&key).await {
            Ok(Some(cached)) => {
                info!(%key, "cache hit");
                return PipelineOutcome::Answered(cached);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{}", PipelineError::CacheUnavailable(e));
            }
        }

        let mut last_error: Option<PipelineError> = None;

        for attempt in 1..=self.settings.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.settings.retry_delay).await;
            }

            match self.attempt(message).await {
                Ok(Attempt::Answer(text)) => {
                    info!(attempt, "answer generated");
                    if let Err(e) = self
                        .cache
                        .put(&key, &text, self.settings.cache_ttl)
                        .await
                    {
                        warn!("{}", PipelineError::CacheUnavailable(e));
                    }
                    return PipelineOutcome::Answered(text);
                }
                Ok(Attempt::NoGrounding) => {
                    info!(attempt, "no relevant knowledge, returning fallback");
                    return PipelineOutcome::Fallback(FALLBACK_CONTACT.to_string());
                }
                Ok(Attempt::Empty) => {
                    warn!(
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        "empty response from generator"
                    );
                }
                Err(e) => {
                    error!(
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        "attempt failed: {e}"
                    );
                    last_error = Some(e);
                }
            }
        }

        let attempts = self.settings.max_attempts;
        let source = match last_error {
            Some(e) => anyhow!(e),
            None => anyhow!("generator returned empty responses on every attempt"),
        };
        PipelineOutcome::Failed(PipelineError::ExhaustedRetries { attempts, source })
    }

    /// One retrieve → gate → (rephrase → retrieve) → generate pass.
    async fn attempt(&self, message: &str) -> Result<Attempt, PipelineError> {
        let threshold = self.settings.relevance_threshold;
        let tag = self.settings.tag.as_deref();

        let first = self.search(message, tag).await?;

        let grounding = if first.relevant(threshold).is_empty() {
            debug!("no relevant passages, rephrasing query");
            let rewritten = self
                .rephraser
                .rewrite(message)
                .await
                .map_err(PipelineError::Generation)?;
            debug!(%rewritten, "retrying retrieval with rephrased query");

            let second = self.search(&rewritten, tag).await?;
            if !second.is_high_quality(threshold) {
                return Ok(Attempt::NoGrounding);
            }
            second
        } else {
            first
        };

        let passages: Vec<String> = grounding
            .relevant(threshold)
            .into_iter()
            .map(|p| p.text.clone())
            .collect();

        let text = self
            .generator
            .generate(message, &passages)
            .await
            .map_err(PipelineError::Generation)?;

        let text = text.trim();
        if text.is_empty() {
            Ok(Attempt::Empty)
        } else {
            Ok(Attempt::Answer(text.to_string()))
        }
    }

    async fn search(
        &self,
        query: &str,
        tag: Option<&str>,
    ) -> Result<RetrievalResult, PipelineError> {
        let passages = self
            .retriever
            .search(query, self.settings.top_k, tag)
            .await
            .map_err(PipelineError::Retrieval)?;
        Ok(RetrievalResult::new(passages))
    }
}
