//! Local BERT sentence embeddings via candle.

use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::embedder::Embedder;
use crate::error::EmbedError;

pub use candle_core::Device as CandleDevice;

pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const MAX_TOKENS: usize = 512;

#[derive(Clone)]
pub struct CandleEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
}

impl std::fmt::Debug for CandleEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEmbedder")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CandleEmbedder {
    /// Load a BERT embedding model from `HuggingFace` Hub.
    ///
    /// # Errors
    ///
    /// Returns an error if model download or loading fails.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, EmbedError> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            EmbedError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
        })?;
        let repo = api.model(repo_id.to_owned());

        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                EmbedError::ModelLoad(format!("failed to download {file} from {repo_id}: {e}"))
            })
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| EmbedError::ModelLoad(format!("failed to read BERT config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_str)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::ModelLoad(format!("failed to load tokenizer: {e}")))?;

        // SAFETY: the hf-hub cache file is not rewritten while the mapping is alive.
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };

        let model = BertModel::load(vb, &config)?;
        tracing::info!(repo_id, device = device_label(device), "embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device: device.clone(),
        })
    }

    /// Sentence embedding: token states averaged over the attention mask,
    /// then scaled to unit length.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the model forward pass fails.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbedError::Inference(format!("tokenizer encode failed: {e}")))?;
        // Whole-file fragments easily exceed the position table.
        encoding.truncate(MAX_TOKENS, 0, tokenizers::TruncationDirection::Right);

        let ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let segments = ids.zeros_like()?;
        let mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&ids, &segments, Some(&mask))?;
        let mask = mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let unit = pooled.broadcast_div(&norm)?.squeeze(0)?;
        Ok(unit.to_vec1::<f32>()?)
    }
}

fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

impl Embedder for CandleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let this = self.clone();
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || this.embed_sync(&text))
            .await
            .map_err(|e| EmbedError::Inference(format!("embedding task panicked: {e}")))?
    }

    fn name(&self) -> &'static str {
        "candle"
    }
}

/// Pick the best available device for the compiled feature set.
#[must_use]
pub fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    if let Ok(device) = Device::new_cuda(0) {
        return device;
    }
    #[cfg(feature = "metal")]
    if let Ok(device) = Device::new_metal(0) {
        return device;
    }
    Device::Cpu
}
