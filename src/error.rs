//! Error taxonomy for the query-resolution pipeline.
//!
//! Adapters return `anyhow::Result`; the pipeline wraps their failures into
//! this enum at the call site so callers can tell transient retrieval and
//! generation faults apart from terminal exhaustion. Cache faults are
//! deliberately non-fatal: the pipeline downgrades them to warnings and
//! proceeds as if the lookup missed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The message failed transport-boundary validation. Never retried.
    #[error("message rejected: {0}")]
    InputRejected(String),

    /// The knowledge retriever errored or timed out.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    /// The rephraser or answer generator errored or timed out.
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// Every attempt failed or produced empty output.
    #[error("no usable answer after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The cache backend errored. Logged and ignored by the pipeline.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(#[source] anyhow::Error),
}
