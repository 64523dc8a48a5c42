//! Turning a [`Config`] into a ready [`AppContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(not(feature = "candle"))]
use anyhow::bail;
use anyhow::Context;
use codectx_embed::AnyEmbedder;
use codectx_embed::ollama::OllamaEmbedder;
use codectx_index::AppContext;
use codectx_store::{InMemoryIndex, QdrantIndex, SqliteIndex, VectorIndex};

use crate::config::{Config, EmbeddingProvider, StoreBackend};

/// Priority: explicit `--config` > `CODECTX_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("CODECTX_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// # Errors
///
/// Returns an error if the selected provider is not compiled in or fails to load.
pub fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProvider::Ollama => Ok(AnyEmbedder::Ollama(OllamaEmbedder::new(
            &embedding.base_url,
            embedding.model().to_owned(),
        ))),
        #[cfg(feature = "candle")]
        EmbeddingProvider::Candle => {
            let device = select_device(&embedding.device)?;
            let embedder = codectx_embed::candle::CandleEmbedder::load(embedding.model(), &device)
                .with_context(|| format!("failed to load embedding model {}", embedding.model()))?;
            Ok(AnyEmbedder::Candle(embedder))
        }
        #[cfg(not(feature = "candle"))]
        EmbeddingProvider::Candle => bail!("embedding provider candle not available (feature not enabled)"),
    }
}

/// Map a device preference (`cpu`, `cuda`, `metal`, `auto`) to a candle device.
///
/// # Errors
///
/// Returns an error if the requested accelerator is not compiled in or unavailable.
#[cfg(feature = "candle")]
pub fn select_device(preference: &str) -> anyhow::Result<codectx_embed::candle::CandleDevice> {
    use codectx_embed::candle::CandleDevice;

    match preference {
        "metal" => {
            #[cfg(feature = "metal")]
            return Ok(CandleDevice::new_metal(0)?);
            #[cfg(not(feature = "metal"))]
            anyhow::bail!("candle compiled without metal feature");
        }
        "cuda" => {
            #[cfg(feature = "cuda")]
            return Ok(CandleDevice::new_cuda(0)?);
            #[cfg(not(feature = "cuda"))]
            anyhow::bail!("candle compiled without cuda feature");
        }
        "auto" => Ok(codectx_embed::candle::default_device()),
        _ => Ok(CandleDevice::Cpu),
    }
}

/// Open the configured vector index, creating the storage directory when needed.
///
/// # Errors
///
/// Returns an error if the storage directory cannot be created or the backend fails to open.
pub async fn create_index(config: &Config) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let store = &config.store;
    let dimensions = config.embedding.dimensions;
    let index: Arc<dyn VectorIndex> = match store.backend {
        StoreBackend::Sqlite => {
            tokio::fs::create_dir_all(&store.data_dir)
                .await
                .with_context(|| {
                    format!("failed to create data dir {}", store.data_dir.display())
                })?;
            let path = store.sqlite_path();
            let index = SqliteIndex::open(&path.to_string_lossy(), dimensions)
                .await
                .with_context(|| format!("failed to open SQLite index {}", path.display()))?;
            Arc::new(index)
        }
        StoreBackend::Qdrant => {
            let index = QdrantIndex::open(&store.qdrant_url, &store.table, dimensions)
                .await
                .with_context(|| format!("failed to connect to Qdrant at {}", store.qdrant_url))?;
            Arc::new(index)
        }
        StoreBackend::Memory => Arc::new(InMemoryIndex::new(dimensions)),
    };
    tracing::info!(
        backend = index.backend(),
        dimensions,
        "vector index ready"
    );
    Ok(index)
}

/// Embed a probe string and compare its length with the configured dimensionality.
///
/// An unreachable backend only warns; a mismatch is an error.
async fn check_dimensions(embedder: &AnyEmbedder, expected: usize) -> anyhow::Result<()> {
    match embedder.probe_dimensions().await {
        Ok(actual) if actual == expected => Ok(()),
        Ok(actual) => anyhow::bail!(
            "embedding model produces {actual}-dimensional vectors, embedding.dimensions is {expected}"
        ),
        Err(e) => {
            tracing::warn!("embedding backend health check failed: {e:#}");
            Ok(())
        }
    }
}

/// Build the shared application context from configuration.
///
/// # Errors
///
/// Returns an error if the embedder or the index cannot be created.
pub async fn build_context(config: &Config) -> anyhow::Result<AppContext> {
    let embedder = create_embedder(config)?;
    check_dimensions(&embedder, config.embedding.dimensions).await?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = config.embedding.model(),
        "embedder ready"
    );
    let index = create_index(config).await?;
    Ok(AppContext::new(
        Arc::new(embedder),
        index,
        config.indexer_config(),
        config.query.top_n,
    ))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn resolve_config_path_prefers_cli() {
        unsafe { std::env::set_var("CODECTX_CONFIG", "/from/env.toml") };
        let path = resolve_config_path(Some(Path::new("/from/cli.toml")));
        unsafe { std::env::remove_var("CODECTX_CONFIG") };
        assert_eq!(path, PathBuf::from("/from/cli.toml"));
    }

    #[test]
    #[serial]
    fn resolve_config_path_env_then_default() {
        unsafe { std::env::set_var("CODECTX_CONFIG", "/from/env.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/from/env.toml"));
        unsafe { std::env::remove_var("CODECTX_CONFIG") };
        assert_eq!(
            resolve_config_path(None),
            PathBuf::from("config/default.toml")
        );
    }

    #[test]
    #[allow(irrefutable_let_patterns)]
    fn ollama_embedder_uses_configured_model() {
        let mut config = Config::default();
        config.embedding.model = Some("nomic-embed-text".into());
        let AnyEmbedder::Ollama(embedder) = create_embedder(&config).unwrap() else {
            panic!("expected ollama embedder");
        };
        assert_eq!(embedder.model(), "nomic-embed-text");
    }

    #[cfg(not(feature = "candle"))]
    #[test]
    fn candle_without_feature_is_an_error() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProvider::Candle;
        let err = create_embedder(&config).unwrap_err();
        assert!(err.to_string().contains("feature not enabled"));
    }

    #[tokio::test]
    async fn memory_index_has_configured_dimensions() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.embedding.dimensions = 16;
        let index = create_index(&config).await.unwrap();
        assert_eq!(index.dimensions(), 16);
        assert_eq!(index.backend(), "memory");
    }

    #[tokio::test]
    async fn sqlite_index_created_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.data_dir = dir.path().join("nested").join("store");
        config.embedding.dimensions = 8;
        let index = create_index(&config).await.unwrap();
        assert_eq!(index.backend(), "sqlite");
        assert!(config.store.sqlite_path().exists());
    }
}
