//! Core data types flowing through the query-resolution pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PipelineError;

/// A knowledge-base passage returned by the retriever, with its
/// dissimilarity score. Lower distance means more relevant.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub text: String,
    pub distance: f32,
}

/// Ordered retrieval results for a single query.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub passages: Vec<RetrievedPassage>,
}

impl RetrievalResult {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self { passages }
    }

    /// Passages with distance strictly below the relevance threshold.
    pub fn relevant(&self, threshold: f32) -> Vec<&RetrievedPassage> {
        self.passages
            .iter()
            .filter(|p| p.distance < threshold)
            .collect()
    }

    /// Mean distance over the full result set. `None` when empty.
    pub fn mean_distance(&self) -> Option<f32> {
        if self.passages.is_empty() {
            return None;
        }
        let sum: f32 = self.passages.iter().map(|p| p.distance).sum();
        Some(sum / self.passages.len() as f32)
    }

    /// A result is high-quality when it has at least one relevant passage
    /// and the mean distance over the full set stays below the threshold.
    /// An empty result set is never high-quality.
    pub fn is_high_quality(&self, threshold: f32) -> bool {
        !self.relevant(threshold).is_empty()
            && self.mean_distance().is_some_and(|mean| mean < threshold)
    }
}

/// Final result of one pipeline invocation. Exactly one variant per call.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// A grounded answer, freshly generated or served from cache.
    Answered(String),
    /// No relevant knowledge found; the fixed contact message.
    Fallback(String),
    /// The message was a greeting; canned reply, no retrieval.
    GreetingReply(String),
    /// The message was empty or whitespace; canned clarification prompt.
    EmptyInputReply(String),
    /// All attempts exhausted without a usable answer.
    Failed(PipelineError),
}

/// Assistant reply returned by the transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub role: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatReply {
    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
