use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::filter::{Filter, Select};
use crate::record::{IndexRecord, Row, ScoredRecord};
use crate::vector_index::{BoxFuture, VectorIndex, check_dimensions, cosine_distance, rank};

/// Process-local index kept in insertion order.
pub struct InMemoryIndex {
    dimensions: usize,
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Copy of every record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn records(&self, filter: &Filter) -> Result<Vec<IndexRecord>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<IndexRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<IndexRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl VectorIndex for InMemoryIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    fn insert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            check_dimensions(self.dimensions, &records)?;
            let mut stored = self.write()?;
            for record in records {
                if let Some(existing) = stored.iter_mut().find(|r| r.id == record.id) {
                    *existing = record;
                } else {
                    stored.push(record);
                }
            }
            Ok(())
        })
    }

    fn delete(&self, filter: Filter) -> BoxFuture<'_, Result<usize, StoreError>> {
        Box::pin(async move {
            let mut stored = self.write()?;
            let before = stored.len();
            stored.retain(|r| !filter.matches(r));
            Ok(before - stored.len())
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<Filter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, StoreError>> {
        Box::pin(async move {
            let filter = filter.unwrap_or_default();
            let scored = self
                .read()?
                .iter()
                .filter(|r| filter.matches(r))
                .map(|r| r.scored(cosine_distance(&vector, &r.vector)))
                .collect();
            Ok(rank(scored, limit))
        })
    }

    fn select(&self, select: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
        Box::pin(async move {
            let filter = select.filter.unwrap_or_default();
            Ok(self
                .read()?
                .iter()
                .filter(|r| filter.matches(r))
                .take(select.limit)
                .map(|r| r.project(&select.columns))
                .collect())
        })
    }

    fn paths(&self) -> BoxFuture<'_, Result<BTreeSet<String>, StoreError>> {
        Box::pin(async move { Ok(self.read()?.iter().map(|r| r.path.clone()).collect()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Column;

    fn record(id: &str, path: &str, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.into(),
            text: format!("text of {id}"),
            path: path.into(),
            start_line: 0,
            end_line: 0,
            kind: "function".into(),
            vector,
            file_hash: format!("hash-{path}"),
        }
    }

    #[tokio::test]
    async fn insert_and_search_orders_by_distance() {
        let index = InMemoryIndex::new(2);
        index
            .insert(vec![
                record("far", "a.js", vec![0.0, 1.0]),
                record("near", "b.js", vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let hits = index.search(vec![1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn search_respects_limit_and_filter() {
        let index = InMemoryIndex::new(2);
        index
            .insert(vec![
                record("a1", "a.js", vec![1.0, 0.0]),
                record("a2", "a.js", vec![0.9, 0.1]),
                record("b1", "b.js", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(vec![1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = index
            .search(vec![1.0, 0.0], 10, Some(Filter::path("a.js")))
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.path == "a.js"));
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn delete_by_path_leaves_other_paths() {
        let index = InMemoryIndex::new(1);
        index
            .insert(vec![
                record("a1", "a.js", vec![1.0]),
                record("a2", "a.js", vec![1.0]),
                record("b1", "b.js", vec![1.0]),
            ])
            .await
            .unwrap();

        let removed = index.delete(Filter::path("a.js")).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(
            index.paths().await.unwrap().into_iter().collect::<Vec<_>>(),
            ["b.js"]
        );
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions() {
        let index = InMemoryIndex::new(3);
        let err = index
            .insert(vec![record("x", "a.js", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Dimension { .. }));
        assert!(index.is_empty().unwrap());
    }

    #[tokio::test]
    async fn select_projects_and_limits() {
        let index = InMemoryIndex::new(1);
        index
            .insert(vec![
                record("a1", "a.js", vec![1.0]),
                record("a2", "a.js", vec![1.0]),
            ])
            .await
            .unwrap();

        let rows = index
            .select(
                Select::columns([Column::FileHash])
                    .filter(Filter::path("a.js"))
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["file_hash"], "hash-a.js");
        assert_eq!(rows[0].len(), 1);

        let none = index
            .select(Select::all().filter(Filter::path("zzz.js")))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn insert_with_same_id_replaces() {
        let index = InMemoryIndex::new(1);
        index
            .insert(vec![record("a1", "a.js", vec![1.0])])
            .await
            .unwrap();
        let mut updated = record("a1", "a.js", vec![1.0]);
        updated.text = "new".into();
        index.insert(vec![updated]).await.unwrap();
        let all = index.records(&Filter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "new");
    }
}
