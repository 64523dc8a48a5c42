mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};
use codectx_index::{IndexerConfig, IngestPlan};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values that would make the indexer or the query service useless.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.concurrency == 0 {
            bail!("index.concurrency must be at least 1");
        }
        if self.query.top_n == 0 {
            bail!("query.top_n must be at least 1");
        }
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be at least 1");
        }
        if self.index.languages.is_empty() {
            bail!("index.languages must name at least one language");
        }
        if let Some(set) = self.index.languages.iter().find(|s| s.extensions.is_empty()) {
            bail!("index.languages entry for {} has no extensions", set.language);
        }
        if self.store.table.is_empty() {
            bail!("store.table must not be empty");
        }
        Ok(())
    }

    /// Walker settings; the storage directory is always excluded.
    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        let mut exclude_dirs = self.index.exclude_dirs.clone();
        if let Some(name) = self.store.data_dir.file_name().and_then(|n| n.to_str())
            && !exclude_dirs.iter().any(|d| d == name)
        {
            exclude_dirs.push(name.to_owned());
        }
        IndexerConfig {
            exclude_dirs,
            reserved_prefix: self.index.reserved_prefix.clone(),
            concurrency: self.index.concurrency,
            prune_deleted: self.index.prune_deleted,
            respect_gitignore: self.index.respect_gitignore,
        }
    }

    /// One ingestion plan per configured language set.
    #[must_use]
    pub fn ingest_plans(&self) -> Vec<IngestPlan> {
        self.index
            .languages
            .iter()
            .map(|set| {
                IngestPlan::new(&self.index.project_root, set.extensions.iter().cloned())
                    .with_language(set.language)
            })
            .collect()
    }
}
