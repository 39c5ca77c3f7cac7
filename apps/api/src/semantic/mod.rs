//! Semantic layer: local embeddings, cosine matching and the candidate index.
//!
//! - `embeddings`: the `Embedder` collaborator and its fastembed implementation
//! - `text`: resume/job text renderings fed to the model
//! - `similarity`: `SemanticMatcher`, the pre-filter and embedding-space analyses
//! - `index`: in-memory `VectorStore` for candidate search

pub mod embeddings;
pub mod index;
pub mod similarity;
pub mod text;

pub use embeddings::{Embedder, EmbeddingError, FastEmbedModel};
pub use index::{CandidateIndex, IndexError, IndexedCandidate, VectorStore};
pub use similarity::SemanticMatcher;

use crate::models::JobDescription;

/// Nearest indexed candidates for a job, queried with the job's text representation.
pub async fn search_candidates(
    store: &dyn VectorStore,
    job: &JobDescription,
    k: usize,
    min_score: f32,
) -> Result<Vec<IndexedCandidate>, IndexError> {
    store.query(&text::job_representation(job), k, min_score).await
}
