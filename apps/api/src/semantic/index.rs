//! In-memory candidate index with cosine similarity search.
//!
//! Implements the `VectorStore` collaborator used by candidate search. The core
//! matching path never touches it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::embeddings::{embed_exact, Embedder, EmbeddingError};
use super::similarity::cosine_similarity;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot index zero-norm vector")]
    ZeroNormVector,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexedCandidate {
    pub id: String,
    /// Cosine similarity to the query
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Opaque nearest-neighbour index over candidate texts.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, id: &str, text: &str, metadata: Map<String, Value>) -> Result<(), IndexError>;

    /// Up to `k` entries scoring at least `min_score`, best first.
    async fn query(&self, text: &str, k: usize, min_score: f32) -> Result<Vec<IndexedCandidate>, IndexError>;

    async fn remove(&self, id: &str) -> bool;

    async fn len(&self) -> usize;
}

struct Entry {
    embedding: Vec<f32>,
    metadata: Map<String, Value>,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<String, Entry>,
    /// Fixed by the first vector inserted.
    dimensions: Option<usize>,
}

pub struct CandidateIndex {
    embedder: Arc<dyn Embedder>,
    state: RwLock<IndexState>,
}

impl CandidateIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            state: RwLock::new(IndexState::default()),
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let mut vectors = embed_exact(self.embedder.as_ref(), &[text.to_string()]).await?;
        let vector = vectors.pop().unwrap_or_default();
        if l2_norm(&vector) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }
        Ok(vector)
    }
}

#[async_trait]
impl VectorStore for CandidateIndex {
    async fn upsert(&self, id: &str, text: &str, metadata: Map<String, Value>) -> Result<(), IndexError> {
        let embedding = self.embed_one(text).await?;

        let mut state = self.state.write().await;
        match state.dimensions {
            Some(expected) if expected != embedding.len() => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    got: embedding.len(),
                });
            }
            Some(_) => {}
            None => state.dimensions = Some(embedding.len()),
        }

        state.entries.insert(id.to_string(), Entry { embedding, metadata });
        Ok(())
    }

    async fn query(&self, text: &str, k: usize, min_score: f32) -> Result<Vec<IndexedCandidate>, IndexError> {
        let query = self.embed_one(text).await?;

        let state = self.state.read().await;
        if let Some(expected) = state.dimensions {
            if expected != query.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    got: query.len(),
                });
            }
        }

        let mut results: Vec<IndexedCandidate> = state
            .entries
            .iter()
            .filter_map(|(id, entry)| {
                let score = cosine_similarity(&query, &entry.embedding);
                (score >= min_score).then(|| IndexedCandidate {
                    id: id.clone(),
                    score,
                    metadata: entry.metadata.clone(),
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(k);
        Ok(results)
    }

    async fn remove(&self, id: &str) -> bool {
        self.state.write().await.entries.remove(id).is_some()
    }

    async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
