#[cfg(feature = "candle")]
use crate::candle::CandleEmbedder;
use crate::embedder::Embedder;
use crate::error::EmbedError;
#[cfg(any(test, feature = "mock"))]
use crate::mock::MockEmbedder;
use crate::ollama::OllamaEmbedder;

/// Generates a match over all `AnyEmbedder` variants, binding the inner embedder
/// and evaluating the given expression for each arm.
macro_rules! delegate_embedder {
    ($self:expr, |$e:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($e) => $expr,
            #[cfg(feature = "candle")]
            AnyEmbedder::Candle($e) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyEmbedder::Mock($e) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaEmbedder),
    #[cfg(feature = "candle")]
    Candle(CandleEmbedder),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockEmbedder),
}

impl AnyEmbedder {
    /// Embed a probe string to discover the vector size of the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe embedding fails or comes back empty.
    pub async fn probe_dimensions(&self) -> Result<usize, EmbedError> {
        let probe = self.embed("probe").await?;
        if probe.is_empty() {
            return Err(EmbedError::EmptyResponse {
                provider: self.name(),
            });
        }
        Ok(probe.len())
    }
}

impl Embedder for AnyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        delegate_embedder!(self, |e| e.embed(text).await)
    }

    fn name(&self) -> &'static str {
        delegate_embedder!(self, |e| e.name())
    }
}
