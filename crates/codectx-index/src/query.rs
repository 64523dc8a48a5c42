//! Similarity search with a preference for the caller's current file.

use std::sync::Arc;

use codectx_embed::{AnyEmbedder, Embedder};
use codectx_store::{ScoredRecord, VectorIndex};
use serde::Serialize;

use crate::error::Result;

pub const DEFAULT_TOP_N: usize = 10;

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub text: String,
    pub path: String,
    pub start_line: i32,
    pub end_line: i32,
    #[serde(rename = "type")]
    pub kind: String,
    /// `1 - cosine_distance`, in `[-1, 1]`.
    pub score: f32,
}

impl From<ScoredRecord> for QueryHit {
    fn from(record: ScoredRecord) -> Self {
        Self {
            score: 1.0 - record.distance,
            text: record.text,
            path: record.path,
            start_line: record.start_line,
            end_line: record.end_line,
            kind: record.kind,
        }
    }
}

pub struct QueryService<E: Embedder = AnyEmbedder> {
    embedder: Arc<E>,
    index: Arc<dyn VectorIndex>,
    top_n: usize,
}

impl<E: Embedder> std::fmt::Debug for QueryService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("top_n", &self.top_n)
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> QueryService<E> {
    #[must_use]
    pub fn new(embedder: Arc<E>, index: Arc<dyn VectorIndex>, top_n: usize) -> Self {
        Self {
            embedder,
            index,
            top_n,
        }
    }

    /// Embed `query` and return the nearest fragments.
    ///
    /// With `current_path`, hits from that path move to the front; order within
    /// each group stays by ascending distance.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the similarity search fails.
    pub async fn search(&self, query: &str, current_path: Option<&str>) -> Result<Vec<QueryHit>> {
        let vector = self.embedder.embed(query).await?;
        let scored = self.index.search(vector, self.top_n, None).await?;
        let mut hits: Vec<QueryHit> = scored.into_iter().map(QueryHit::from).collect();
        if let Some(current) = current_path {
            hits.sort_by_key(|hit| hit.path != current);
        }
        tracing::debug!(hits = hits.len(), current = current_path, "query served");
        Ok(hits)
    }
}
