use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

use crate::embedder::Embedder;
use crate::error::EmbedError;

/// Embeddings served by a local or remote Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = split_base_url(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::from(text));

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| EmbedError::Request(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(EmbedError::EmptyResponse { provider: "ollama" })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

const DEFAULT_PORT: u16 = 11434;

/// Split `http://host:port` into the pieces `Ollama::new` wants.
fn split_base_url(base_url: &str) -> (String, u16) {
    let trimmed = base_url.trim_end_matches('/');
    match trimmed.rsplit_once(':') {
        Some((host, port)) if !port.starts_with("//") => match port.parse::<u16>() {
            Ok(port) => (host.to_owned(), port),
            Err(_) => (trimmed.to_owned(), DEFAULT_PORT),
        },
        _ => (trimmed.to_owned(), DEFAULT_PORT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_with_explicit_port() {
        assert_eq!(
            split_base_url("http://127.0.0.1:11500"),
            ("http://127.0.0.1".to_owned(), 11500)
        );
    }

    #[test]
    fn base_url_without_port_uses_default() {
        assert_eq!(
            split_base_url("https://ollama.internal"),
            ("https://ollama.internal".to_owned(), DEFAULT_PORT)
        );
    }

    #[test]
    fn base_url_trailing_slash_ignored() {
        assert_eq!(
            split_base_url("http://gpu-box:9000/"),
            ("http://gpu-box".to_owned(), 9000)
        );
    }

    #[test]
    fn base_url_with_garbage_port_kept_whole() {
        assert_eq!(
            split_base_url("http://gpu-box:abc"),
            ("http://gpu-box:abc".to_owned(), DEFAULT_PORT)
        );
    }

    #[test]
    fn new_keeps_model_name() {
        let embedder = OllamaEmbedder::new("http://localhost:11434", "all-minilm".into());
        assert_eq!(embedder.model(), "all-minilm");
        assert_eq!(embedder.name(), "ollama");
    }
}
