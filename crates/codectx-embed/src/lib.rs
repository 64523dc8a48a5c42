//! Text embedding backends for code context indexing.
//!
//! Every backend turns a piece of text into a fixed-length `f32` vector. The
//! vectors are compared with cosine distance, so backends are expected to
//! return L2-normalized output, but callers must not rely on it.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle;
pub mod embedder;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;

pub use any::AnyEmbedder;
pub use embedder::Embedder;
pub use error::{EmbedError, Result};
