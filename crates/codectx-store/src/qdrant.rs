//! Qdrant-backed index. One collection per table, cosine distance.

use std::collections::{BTreeSet, HashMap};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, PointId, PointStruct, RetrievedPoint,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    vectors_output::VectorsOptions,
};

use crate::error::StoreError;
use crate::filter::{Column, FieldValue, Filter, Select};
use crate::record::{IndexRecord, Row, ScoredRecord};
use crate::vector_index::{BoxFuture, VectorIndex, check_dimensions};

type Payload = HashMap<String, qdrant_client::qdrant::Value>;

const SCROLL_PAGE: u32 = 256;

#[derive(Clone)]
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimensions: usize,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl QdrantIndex {
    /// Connect and make sure the collection exists with a keyword index on `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached or collection setup fails.
    pub async fn open(url: &str, collection: &str, dimensions: usize) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        let index = Self {
            client,
            collection: collection.to_owned(),
            dimensions,
        };
        index.ensure_collection().await?;
        Ok(index)
    }

    async fn ensure_collection(&self) -> Result<(), StoreError> {
        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }

        let size = u64::try_from(self.dimensions)?;
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                Column::Path.as_str(),
                FieldType::Keyword,
            ))
            .await
            .map_err(Box::new)?;

        tracing::info!(collection = %self.collection, size, "created Qdrant collection");
        Ok(())
    }

    async fn scroll(
        &self,
        filter: Option<&Filter>,
        limit: usize,
        with_vectors: bool,
    ) -> Result<Vec<RetrievedPoint>, StoreError> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;

        while points.len() < limit {
            let remaining = u32::try_from(limit - points.len()).unwrap_or(u32::MAX);
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .with_payload(true)
                .with_vectors(with_vectors)
                .limit(remaining.min(SCROLL_PAGE));
            if let Some(f) = filter {
                builder = builder.filter(to_qdrant_filter(f));
            }
            if let Some(off) = offset.take() {
                builder = builder.offset(off);
            }

            let response = self.client.scroll(builder).await.map_err(Box::new)?;
            points.extend(response.result);

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        points.truncate(limit);
        Ok(points)
    }
}

/// Qdrant point ids must be integers or UUIDs; derive a stable UUID from the record id.
#[must_use]
pub fn point_id(record_id: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, record_id.as_bytes()).to_string()
}

fn to_qdrant_filter(filter: &Filter) -> qdrant_client::qdrant::Filter {
    qdrant_client::qdrant::Filter::must(filter.conditions().iter().map(|c| {
        match &c.value {
            FieldValue::Text(s) => Condition::matches(c.column.as_str(), s.clone()),
            FieldValue::Integer(i) => Condition::matches(c.column.as_str(), *i),
        }
    }))
}

fn payload_for(record: &IndexRecord) -> Result<Payload, StoreError> {
    Ok(serde_json::from_value(serde_json::json!({
        "id": record.id,
        "text": record.text,
        "path": record.path,
        "start_line": record.start_line,
        "end_line": record.end_line,
        "type": record.kind,
        "file_hash": record.file_hash,
    }))?)
}

fn get_str(payload: &Payload, column: Column) -> Option<String> {
    payload
        .get(column.as_str())
        .and_then(qdrant_client::qdrant::Value::as_str)
        .cloned()
}

fn get_line(payload: &Payload, column: Column) -> Option<i32> {
    payload
        .get(column.as_str())
        .and_then(qdrant_client::qdrant::Value::as_integer)
        .and_then(|v| i32::try_from(v).ok())
}

fn scored_from_payload(payload: &Payload, score: f32) -> Option<ScoredRecord> {
    Some(ScoredRecord {
        id: get_str(payload, Column::Id)?,
        text: get_str(payload, Column::Text)?,
        path: get_str(payload, Column::Path)?,
        start_line: get_line(payload, Column::StartLine)?,
        end_line: get_line(payload, Column::EndLine)?,
        kind: get_str(payload, Column::Kind)?,
        file_hash: get_str(payload, Column::FileHash).unwrap_or_default(),
        distance: 1.0 - score,
    })
}

#[allow(deprecated)]
fn point_vector(point: &RetrievedPoint) -> Vec<f32> {
    match point
        .vectors
        .as_ref()
        .and_then(|v| v.vectors_options.as_ref())
    {
        Some(VectorsOptions::Vector(v)) => v.data.clone(),
        _ => Vec::new(),
    }
}

fn project_point(point: &RetrievedPoint, columns: &[Column]) -> Row {
    let mut row = Row::new();
    for &column in columns {
        let value = match column {
            Column::Vector => serde_json::Value::from(point_vector(point)),
            Column::StartLine | Column::EndLine => get_line(&point.payload, column)
                .map_or(serde_json::Value::Null, serde_json::Value::from),
            _ => get_str(&point.payload, column)
                .map_or(serde_json::Value::Null, serde_json::Value::String),
        };
        row.insert(column.as_str().to_owned(), value);
    }
    row
}

impl VectorIndex for QdrantIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }

    fn insert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            check_dimensions(self.dimensions, &records)?;
            if records.is_empty() {
                return Ok(());
            }
            let points = records
                .into_iter()
                .map(|r| {
                    let payload = payload_for(&r)?;
                    Ok(PointStruct::new(point_id(&r.id), r.vector, payload))
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(Box::new)?;
            Ok(())
        })
    }

    fn delete(&self, filter: Filter) -> BoxFuture<'_, Result<usize, StoreError>> {
        Box::pin(async move {
            let qfilter = to_qdrant_filter(&filter);
            let count = self
                .client
                .count(
                    CountPointsBuilder::new(&self.collection)
                        .filter(qfilter.clone())
                        .exact(true),
                )
                .await
                .map_err(Box::new)?
                .result
                .map_or(0, |r| r.count);
            if count == 0 {
                return Ok(0);
            }
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection)
                        .points(qfilter)
                        .wait(true),
                )
                .await
                .map_err(Box::new)?;
            Ok(usize::try_from(count)?)
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<Filter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, StoreError>> {
        Box::pin(async move {
            let mut builder =
                SearchPointsBuilder::new(&self.collection, vector, u64::try_from(limit)?)
                    .with_payload(true);
            if let Some(f) = filter.as_ref() {
                builder = builder.filter(to_qdrant_filter(f));
            }
            let results = self.client.search_points(builder).await.map_err(Box::new)?;
            Ok(results
                .result
                .iter()
                .filter_map(|p| scored_from_payload(&p.payload, p.score))
                .collect())
        })
    }

    fn select(&self, select: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
        Box::pin(async move {
            let points = self
                .scroll(select.filter.as_ref(), select.limit, select.needs_vector())
                .await?;
            Ok(points
                .iter()
                .map(|p| project_point(p, &select.columns))
                .collect())
        })
    }

    fn paths(&self) -> BoxFuture<'_, Result<BTreeSet<String>, StoreError>> {
        Box::pin(async move {
            let points = self.scroll(None, usize::MAX, false).await?;
            Ok(points
                .iter()
                .filter_map(|p| get_str(&p.payload, Column::Path))
                .collect())
        })
    }
}
