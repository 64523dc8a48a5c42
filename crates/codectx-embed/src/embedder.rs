use std::future::Future;

use crate::error::EmbedError;

/// A text → vector function backed by a model.
///
/// Implementations are shared across ingestion workers, so `embed` takes `&self`
/// and must be safe to call concurrently.
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing model cannot produce a vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbedError>> + Send;

    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
}
