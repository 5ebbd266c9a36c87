//! Knowledge retrieval capability.
//!
//! The vector index is an external collaborator: this module only defines
//! the [`KnowledgeRetriever`] capability trait and a thin HTTP adapter for a
//! nearest-neighbor search service. The adapter is single-shot: retries
//! belong to the pipeline, which owns the attempt budget.
//!
//! # Wire contract
//!
//! ```text
//! POST {base}/search
//! { "query": "...", "k": 5, "filter": "faq" }
//!
//! 200 OK
//! { "results": [ { "text": "...", "distance": 0.42 }, ... ] }
//! ```

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::models::RetrievedPassage;

/// Nearest-neighbor search over the knowledge base.
///
/// Implementations must return passages ordered by ascending distance
/// (most relevant first). The optional `filter` restricts results to a
/// tagged knowledge subset (e.g. FAQ-only content).
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>>;
}

/// HTTP adapter for an external vector search service.
pub struct VectorServiceRetriever {
    url: String,
    client: reqwest::Client,
}

impl VectorServiceRetriever {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl KnowledgeRetriever for VectorServiceRetriever {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>> {
        let body = serde_json::json!({
            "query": query,
            "k": k,
            "filter": filter,
        });

        let response = self
            .client
            .post(format!("{}/search", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Vector search connection error ({}): {}", self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Vector search error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_search_response(&json)
    }
}

/// Extract `results[].{text,distance}` pairs from a search response.
///
/// The contract requires non-negative distances; anything below zero is
/// clamped to zero.
fn parse_search_response(json: &serde_json::Value) -> Result<Vec<RetrievedPassage>> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow!("Invalid search response: missing results array"))?;

    let mut passages = Vec::with_capacity(results.len());

    for item in results {
        let text = item
            .get("text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("Invalid search response: missing text"))?;
        let distance = item
            .get("distance")
            .and_then(|d| d.as_f64())
            .ok_or_else(|| anyhow!("Invalid search response: missing distance"))?;

        passages.push(RetrievedPassage {
            text: text.to_string(),
            distance: (distance as f32).max(0.0),
        });
    }

    Ok(passages)
}

/// Create the retriever from configuration.
pub fn create_retriever(config: &RetrievalConfig) -> Result<Arc<dyn KnowledgeRetriever>> {
    Ok(Arc::new(VectorServiceRetriever::new(config)?))
}
