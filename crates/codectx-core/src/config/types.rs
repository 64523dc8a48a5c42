use std::path::PathBuf;

use codectx_index::LanguageKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Requests per minute per client IP; `0` disables limiting.
    #[serde(default)]
    pub rate_limit: u32,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_size() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auth_token: None,
            rate_limit: 0,
            max_body_size: default_max_body_size(),
        }
    }
}

/// Extensions walked for one language; every file of the set goes through its adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageSet {
    pub language: LanguageKind,
    pub extensions: Vec<String>,
}

impl LanguageSet {
    #[must_use]
    pub fn new(language: LanguageKind, extensions: &[&str]) -> Self {
        Self {
            language,
            extensions: extensions.iter().map(|e| (*e).to_owned()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_true")]
    pub prune_deleted: bool,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_true")]
    pub startup_ingest: bool,
    #[serde(default)]
    pub respect_gitignore: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<LanguageSet>,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_exclude_dirs() -> Vec<String> {
    vec!["node_modules".into(), ".git".into(), "build".into()]
}

fn default_reserved_prefix() -> String {
    ".".into()
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<LanguageSet> {
    vec![
        LanguageSet::new(LanguageKind::JavaScript, &["js", "jsx", "mjs"]),
        LanguageSet::new(LanguageKind::TypeScript, &["ts", "tsx"]),
        LanguageSet::new(LanguageKind::Java, &["java"]),
    ]
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            exclude_dirs: default_exclude_dirs(),
            reserved_prefix: default_reserved_prefix(),
            concurrency: default_concurrency(),
            prune_deleted: true,
            watch: false,
            startup_ingest: true,
            respect_gitignore: false,
            languages: default_languages(),
        }
    }
}

impl IndexConfig {
    /// Every configured extension, deduplicated, in declaration order.
    #[must_use]
    pub fn extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ext in self.languages.iter().flat_map(|set| &set.extensions) {
            if !out.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                out.push(ext.clone());
            }
        }
        out
    }
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Ollama,
    Candle,
}

impl EmbeddingProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Candle => "candle",
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "all-minilm",
            Self::Candle => "sentence-transformers/all-MiniLM-L6-v2",
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    /// Falls back to the provider's default model when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// `cpu`, `cuda`, `metal` or `auto`; only read by the candle provider.
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_dimensions() -> usize {
    384
}

fn default_device() -> String {
    "cpu".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: None,
            base_url: default_embedding_base_url(),
            dimensions: default_dimensions(),
            device: default_device(),
        }
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Vector index backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Qdrant,
    Memory,
}

impl StoreBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Qdrant => "qdrant",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// SQLite file stem and Qdrant collection name.
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".codectx")
}

fn default_table() -> String {
    "code_context".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            table: default_table(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.table))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    codectx_index::query::DEFAULT_TOP_N
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}
