//! Deterministic embedder for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedder::Embedder;
use crate::error::EmbedError;

/// Hashes whitespace-separated tokens into buckets, then L2-normalizes.
///
/// Texts sharing tokens get similar vectors, which is enough to exercise
/// ranking without a real model. Every call is counted.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    /// Any text containing this marker fails to embed.
    pub fail_on: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimensions: 384,
            fail_on: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_on = Some(marker.into());
        self
    }

    /// Number of `embed` calls so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions.max(1)];
        let len = vector.len();
        for token in text.split_whitespace() {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = usize::from(u16::from_le_bytes([bytes[0], bytes[1]])) % len;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on
            && text.contains(marker.as_str())
        {
            return Err(EmbedError::Other("mock embedding failure".into()));
        }
        Ok(self.vector_for(text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
