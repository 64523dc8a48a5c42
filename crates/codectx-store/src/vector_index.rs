use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::filter::{Filter, Select};
use crate::record::{IndexRecord, Row, ScoredRecord};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage contract for indexed fragments.
///
/// Writes are serialized by each backend. Callers replacing the records of a
/// path must issue `delete` before `insert`; the two are not atomic together.
pub trait VectorIndex: Send + Sync {
    /// Vector length every inserted record must have.
    fn dimensions(&self) -> usize;

    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    fn insert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Delete every record matching `filter`, returning how many were removed.
    fn delete(&self, filter: Filter) -> BoxFuture<'_, Result<usize, StoreError>>;

    /// Nearest neighbors by ascending cosine distance. Ties keep storage order.
    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<Filter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, StoreError>>;

    fn select(&self, select: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>>;

    /// Distinct paths that currently have records.
    fn paths(&self) -> BoxFuture<'_, Result<BTreeSet<String>, StoreError>>;
}

/// `1 - cosine_similarity`. Zero vectors are treated as orthogonal to everything.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

pub(crate) fn check_dimensions(expected: usize, records: &[IndexRecord]) -> Result<(), StoreError> {
    if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
        return Err(StoreError::Dimension {
            expected,
            actual: bad.vector.len(),
        });
    }
    Ok(())
}

/// Sort by ascending distance, keeping input order for ties, then truncate.
pub(crate) fn rank(mut scored: Vec<ScoredRecord>, limit: usize) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}
