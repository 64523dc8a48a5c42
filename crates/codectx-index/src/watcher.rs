use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use codectx_embed::Embedder;
use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::indexer::IncrementalIndexer;

/// Re-indexes files under a root as they change on disk.
///
/// The watch stops when the value is dropped.
pub struct IndexWatcher {
    handle: tokio::task::JoinHandle<()>,
}

impl IndexWatcher {
    /// # Errors
    ///
    /// Returns an error if the filesystem watcher cannot be initialized.
    pub fn start<E: Embedder + 'static>(
        root: &Path,
        extensions: Vec<String>,
        indexer: Arc<IncrementalIndexer<E>>,
    ) -> Result<Self> {
        let root = root.canonicalize()?;
        let (notify_tx, mut notify_rx) = mpsc::channel::<PathBuf>(64);
        let config = indexer.config().clone();
        let filter_root = root.clone();

        let mut debouncer = new_debouncer(
            Duration::from_secs(1),
            move |events: std::result::Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                let events = match events {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!("index watcher error: {e}");
                        return;
                    }
                };

                let paths: HashSet<PathBuf> = events
                    .into_iter()
                    .filter(|e| {
                        e.kind == DebouncedEventKind::Any
                            && config.is_indexable(&filter_root, &e.path, &extensions)
                    })
                    .map(|e| e.path)
                    .collect();

                for path in paths {
                    let _ = notify_tx.blocking_send(path);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&root, notify::RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching for changes");

        let handle = tokio::spawn(async move {
            let _debouncer = debouncer;
            while let Some(path) = notify_rx.recv().await {
                match indexer.reindex_path(&path).await {
                    Ok(outcome) => {
                        tracing::debug!(path = %path.display(), ?outcome, "reindexed");
                    }
                    Err(e) => tracing::warn!(path = %path.display(), "reindex failed: {e:#}"),
                }
            }
        });

        Ok(Self { handle })
    }
}

impl Drop for IndexWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
