#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("unexpected embedding size: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EmbedError>;
