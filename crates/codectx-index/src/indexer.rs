//! Incremental ingestion: walk → hash check → extract → embed → replace by path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use codectx_embed::{AnyEmbedder, Embedder};
use codectx_store::{Column, Filter, IndexRecord, Select, VectorIndex};
use futures::StreamExt;
use ignore::WalkBuilder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterRegistry, LanguageAdapter};
use crate::error::Result;
use crate::extractor::ContextExtractor;
use crate::languages::LanguageKind;
use crate::locks::PathLocks;

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Directories whose name starts with this prefix are skipped too.
    pub reserved_prefix: String,
    /// Files ingested concurrently.
    pub concurrency: usize,
    /// Drop records of files that disappeared since the last run.
    pub prune_deleted: bool,
    pub respect_gitignore: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![".git".into(), "node_modules".into(), "build".into()],
            reserved_prefix: ".".into(),
            concurrency: 4,
            prune_deleted: true,
            respect_gitignore: false,
        }
    }
}

impl IndexerConfig {
    #[must_use]
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
            || (!self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix))
    }

    /// Whether a changed file under `root` should be re-indexed.
    #[must_use]
    pub fn is_indexable(&self, root: &Path, path: &Path, extensions: &[String]) -> bool {
        if !has_extension(path, extensions) {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let Some(dirs) = relative.parent() else {
            return true;
        };
        !dirs
            .components()
            .any(|c| self.is_excluded_dir(&c.as_os_str().to_string_lossy()))
    }
}

/// One walk over a project tree.
#[derive(Debug, Clone)]
pub struct IngestPlan {
    pub root: PathBuf,
    /// Extensions without the dot, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Adapter for every file of the walk; `None` selects by extension.
    pub language: Option<LanguageKind>,
}

impl IngestPlan {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            language: None,
        }
    }

    /// Plan covering every extension of `language`, parsed with its adapter.
    #[must_use]
    pub fn for_language(root: impl Into<PathBuf>, language: LanguageKind) -> Self {
        Self {
            language: Some(language),
            ..Self::new(root, language.extensions().iter().copied())
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: LanguageKind) -> Self {
        self.language = Some(language);
        self
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Old records replaced by `records` new ones.
    Indexed { records: usize, removed: usize },
    /// Stored hash matches the content.
    Unchanged,
    /// Extraction produced nothing to store.
    Empty,
    /// File is gone; its records were dropped.
    Removed { records: usize },
    /// Stopped before commit; the stored records are untouched.
    Cancelled,
}

/// Summary of an ingestion run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_empty: usize,
    pub files_failed: usize,
    pub files_cancelled: usize,
    pub records_written: usize,
    pub records_removed: usize,
    pub errors: Vec<String>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl IngestReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Indexed { records, removed } => {
                self.files_indexed += 1;
                self.records_written += records;
                self.records_removed += removed;
            }
            FileOutcome::Unchanged => self.files_skipped += 1,
            FileOutcome::Empty => self.files_empty += 1,
            FileOutcome::Removed { records } => self.records_removed += records,
            FileOutcome::Cancelled => self.files_cancelled += 1,
        }
    }
}

/// SHA-256 of the whole file content, hex encoded.
#[must_use]
pub fn file_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Keeps the index for every path equal to the latest content of that path.
pub struct IncrementalIndexer<E: Embedder = AnyEmbedder> {
    embedder: Arc<E>,
    index: Arc<dyn VectorIndex>,
    adapters: Arc<AdapterRegistry>,
    extractor: ContextExtractor,
    locks: PathLocks,
    config: IndexerConfig,
}

impl<E: Embedder> std::fmt::Debug for IncrementalIndexer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalIndexer")
            .field("embedder", &self.embedder.name())
            .field("index", &self.index.backend())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> IncrementalIndexer<E> {
    #[must_use]
    pub fn new(
        embedder: Arc<E>,
        index: Arc<dyn VectorIndex>,
        adapters: Arc<AdapterRegistry>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            adapters,
            extractor: ContextExtractor::default(),
            locks: PathLocks::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: ContextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Walk `plan.root` and bring every matching file up to date.
    ///
    /// Per-file failures are logged and counted; they never abort the run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root cannot be resolved.
    pub async fn ingest(&self, plan: &IngestPlan, cancel: &CancellationToken) -> Result<IngestReport> {
        let start = Instant::now();
        let mut report = IngestReport::default();

        let root = tokio::fs::canonicalize(&plan.root).await?;
        let files = self.collect_files(&root, &plan.extensions);
        report.files_scanned = files.len();
        tracing::info!(
            root = %root.display(),
            language = plan.language.map(LanguageKind::id),
            total = files.len(),
            "ingestion started"
        );

        let language = plan.language;
        let mut results = futures::stream::iter(files)
            .map(|path| async move {
                let outcome = self.ingest_file(&path, language, cancel).await;
                (path, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((path, outcome)) = results.next().await {
            match outcome {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "ingestion failed: {e:#}");
                    report.files_failed += 1;
                    report.errors.push(format!("{}: {e:#}", path.display()));
                }
            }
        }
        drop(results);

        report.cancelled = cancel.is_cancelled();
        if self.config.prune_deleted && !report.cancelled {
            match self.prune(&root, &plan.extensions).await {
                Ok(removed) => report.records_removed += removed,
                Err(e) => report.errors.push(format!("prune: {e:#}")),
            }
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            scanned = report.files_scanned,
            indexed = report.files_indexed,
            skipped = report.files_skipped,
            failed = report.files_failed,
            records = report.records_written,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Bring one file on disk up to date, skipping it when its hash is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, embedding or storing fails. Stored records of
    /// the path are left as they were unless the final delete+insert ran.
    pub async fn ingest_file(
        &self,
        path: &Path,
        language: Option<LanguageKind>,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome> {
        if cancel.is_cancelled() {
            return Ok(FileOutcome::Cancelled);
        }
        let content = tokio::fs::read_to_string(path).await?;
        let key = path_key(path);
        let hash = file_hash(&content);

        let _guard = self.locks.lock(&key).await;
        if self.stored_hash(&key).await?.as_deref() == Some(hash.as_str()) {
            tracing::debug!(path = %key, "unchanged, skipping");
            return Ok(FileOutcome::Unchanged);
        }

        let adapter = match language {
            Some(kind) => self.adapters.get(kind)?,
            None => self.adapters.for_path(path)?,
        };
        self.replace(&key, &content, &hash, adapter.as_ref(), Some(cancel))
            .await
    }

    /// Ingest an in-memory payload for `path`, replacing whatever is stored.
    ///
    /// The hash check is bypassed; records are still stamped with the content hash
    /// so a later walk over the same content skips the file.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storing fails.
    pub async fn ingest_source(&self, path: &str, content: &str) -> Result<FileOutcome> {
        let hash = file_hash(content);
        let adapter = self.adapters.for_path(Path::new(path))?;
        let _guard = self.locks.lock(path).await;
        self.replace(path, content, &hash, adapter.as_ref(), None)
            .await
    }

    /// Re-index a path after a change on disk, or drop its records if it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, embedding or storing fails.
    pub async fn reindex_path(&self, path: &Path) -> Result<FileOutcome> {
        if tokio::fs::try_exists(path).await? {
            return self
                .ingest_file(path, None, &CancellationToken::new())
                .await;
        }
        let key = path_key(path);
        let records = self.remove_path(&key).await?;
        tracing::debug!(path = %key, records, "removed records of deleted file");
        Ok(FileOutcome::Removed { records })
    }

    /// Delete records of stored paths under `root` with one of `extensions` that
    /// no longer exist on disk. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub async fn prune(&self, root: &Path, extensions: &[String]) -> Result<usize> {
        let mut removed = 0;
        for stored in self.index.paths().await? {
            let path = Path::new(&stored);
            if !path.starts_with(root) || !has_extension(path, extensions) {
                continue;
            }
            if tokio::fs::try_exists(path).await.unwrap_or(true) {
                continue;
            }
            let n = self.remove_path(&stored).await?;
            tracing::debug!(path = %stored, records = n, "pruned deleted file");
            removed += n;
        }
        Ok(removed)
    }

    async fn remove_path(&self, key: &str) -> Result<usize> {
        let _guard = self.locks.lock(key).await;
        Ok(self.index.delete(Filter::path(key)).await?)
    }

    async fn stored_hash(&self, key: &str) -> Result<Option<String>> {
        let rows = self
            .index
            .select(
                Select::columns([Column::FileHash])
                    .filter(Filter::path(key))
                    .limit(1),
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(Column::FileHash.as_str()))
            .and_then(|v| v.as_str())
            .map(str::to_owned))
    }

    /// Extract, embed, then delete-and-insert. The caller holds the path lock.
    async fn replace(
        &self,
        key: &str,
        content: &str,
        hash: &str,
        adapter: &dyn LanguageAdapter,
        cancel: Option<&CancellationToken>,
    ) -> Result<FileOutcome> {
        let fragments = self.extractor.extract(content, key, adapter);
        if fragments.is_empty() {
            tracing::debug!(path = %key, "no fragments extracted");
            return Ok(FileOutcome::Empty);
        }

        let mut records = Vec::with_capacity(fragments.len());
        for (ordinal, fragment) in fragments.into_iter().enumerate() {
            let vector = self.embedder.embed(&fragment.text).await?;
            records.push(IndexRecord {
                id: fragment.record_id(key, ordinal),
                path: key.to_owned(),
                start_line: line_to_i32(fragment.start_line),
                end_line: line_to_i32(fragment.end_line),
                kind: fragment.kind.as_str().to_owned(),
                text: fragment.text,
                vector,
                file_hash: hash.to_owned(),
            });
        }

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(path = %key, "cancelled before commit");
            return Ok(FileOutcome::Cancelled);
        }

        let removed = self.index.delete(Filter::path(key)).await?;
        let written = records.len();
        self.index.insert(records).await?;
        tracing::debug!(path = %key, records = written, removed, "path replaced");
        Ok(FileOutcome::Indexed {
            records: written,
            removed,
        })
    }

    fn collect_files(&self, root: &Path, extensions: &[String]) -> Vec<PathBuf> {
        let config = self.config.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(self.config.respect_gitignore)
            .parents(self.config.respect_gitignore)
            .git_ignore(self.config.respect_gitignore)
            .git_global(false)
            .git_exclude(false)
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !entry.file_type().is_some_and(|ft| ft.is_dir())
                    || !config.is_excluded_dir(&entry.file_name().to_string_lossy())
            })
            .build();

        let mut files: Vec<PathBuf> = walker
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| has_extension(p, extensions))
            .collect();
        files.sort();
        files
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
}

fn line_to_i32(line: usize) -> i32 {
    i32::try_from(line).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            file_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(file_hash("abc").len(), 64);
        assert_ne!(file_hash("a"), file_hash("b"));
    }

    #[test]
    fn default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.concurrency, 4);
        assert!(config.prune_deleted);
        assert!(config.is_excluded_dir("node_modules"));
        assert!(config.is_excluded_dir(".cache"));
        assert!(!config.is_excluded_dir("src"));
    }

    #[test]
    fn indexable_checks_extension_and_dirs() {
        let config = IndexerConfig::default();
        let root = Path::new("/project");
        let exts = vec!["js".to_owned(), ".ts".to_owned()];
        assert!(config.is_indexable(root, Path::new("/project/src/a.js"), &exts));
        assert!(config.is_indexable(root, Path::new("/project/b.TS"), &exts));
        assert!(!config.is_indexable(root, Path::new("/project/src/a.java"), &exts));
        assert!(!config.is_indexable(root, Path::new("/project/node_modules/x/a.js"), &exts));
        assert!(!config.is_indexable(root, Path::new("/project/.git/hooks/a.js"), &exts));
    }

    #[test]
    fn plan_for_language_uses_its_extensions() {
        let plan = IngestPlan::for_language("/tmp", LanguageKind::Java);
        assert_eq!(plan.extensions, ["java"]);
        assert_eq!(plan.language, Some(LanguageKind::Java));
    }

    #[test]
    fn report_accumulates_outcomes() {
        let mut report = IngestReport::default();
        report.record(FileOutcome::Indexed {
            records: 3,
            removed: 2,
        });
        report.record(FileOutcome::Unchanged);
        report.record(FileOutcome::Empty);
        report.record(FileOutcome::Cancelled);
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.records_written, 3);
        assert_eq!(report.records_removed, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_empty, 1);
        assert_eq!(report.files_cancelled, 1);
    }
}
