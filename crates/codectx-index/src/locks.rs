//! Per-path write serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// One async mutex per path, so delete+insert for a path never interleaves with
/// another writer of the same path. Different paths never contend.
#[derive(Debug, Default, Clone)]
pub struct PathLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Held while a path is being rewritten. Dropping it releases the path.
pub struct PathGuard {
    path: String,
    locks: PathLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other writer holds `path`.
    pub async fn lock(&self, path: &str) -> PathGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(map.entry(path.to_owned()).or_default())
        };
        let guard = mutex.lock_owned().await;
        PathGuard {
            path: path.to_owned(),
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    /// Paths with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self
            .locks
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Only the map itself still references the mutex: nobody holds or waits on it.
        if map
            .get(&self.path)
            .is_some_and(|m| Arc::strong_count(m) == 1)
        {
            map.remove(&self.path);
        }
    }
}

impl std::fmt::Debug for PathGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGuard").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_path_is_exclusive() {
        let locks = PathLocks::new();
        let first = locks.lock("a.js").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("a.js").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_paths_do_not_contend() {
        let locks = PathLocks::new();
        let _a = locks.lock("a.js").await;
        tokio::time::timeout(Duration::from_millis(100), locks.lock("b.js"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn entries_are_released() {
        let locks = PathLocks::new();
        {
            let _g = locks.lock("a.js").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
