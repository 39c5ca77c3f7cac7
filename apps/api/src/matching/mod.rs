//! Two-stage matching pipeline.
//!
//! Semantic pre-filter, then five concurrent dimension evaluations alongside an
//! LLM skill analysis, then aggregation and a reasoning narrative.

pub mod aggregate;
pub mod analysis;
pub mod dimensions;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod skills;
pub mod weights;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::llm_client::{LlmError, LlmReply};
use crate::semantic::EmbeddingError;

pub use pipeline::MatchEngine;

/// Failures that abort a whole match. LLM failures never do; they degrade instead.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Semantic similarity unavailable: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Match task failed: {0}")]
    Task(String),
}

/// Bounds an LLM call by `deadline`; an elapsed deadline becomes `LlmError::Timeout`.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or_else(|_| Err(LlmError::Timeout(deadline)))
}

/// Cost and provider latency of the LLM replies behind one pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct CallUsage {
    pub cost: f64,
    pub latency_ms: f64,
}

impl CallUsage {
    pub fn of(reply: &LlmReply) -> Self {
        Self {
            cost: reply.cost,
            latency_ms: reply.latency_ms,
        }
    }
}
