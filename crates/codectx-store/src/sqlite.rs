//! `SQLite`-backed index: one row per record, vectors as little-endian `f32` blobs,
//! brute-force cosine search.

use std::collections::BTreeSet;
use std::str::FromStr;

use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, Sqlite, SqlitePool};

use crate::error::StoreError;
use crate::filter::{Column, FieldValue, Filter, Select};
use crate::record::{IndexRecord, Row, ScoredRecord};
use crate::vector_index::{BoxFuture, VectorIndex, check_dimensions, cosine_distance, rank};

const TABLE: &str = "code_context";
const SCALAR_COLUMNS: &str = "id, text, path, start_line, end_line, type, file_hash";

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

#[derive(Debug, Clone)]
pub struct SqliteIndex {
    pool: SqlitePool,
    dimensions: usize,
}

impl SqliteIndex {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// The first open records `dimensions`; later opens with a different value fail
    /// so vectors from two embedding models never mix in one table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, migrations fail, or the
    /// stored dimensionality differs.
    pub async fn open(path: &str, dimensions: usize) -> Result<Self, StoreError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // An in-memory database lives and dies with its connection.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        let index = Self { pool, dimensions };
        index.check_stored_dimensions().await?;
        Ok(index)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn check_stored_dimensions(&self) -> Result<(), StoreError> {
        let stored: Option<(String,)> =
            sqlx::query_as("SELECT value FROM index_meta WHERE key = 'dimensions'")
                .fetch_optional(&self.pool)
                .await?;

        match stored {
            Some((value,)) => {
                let expected = value.parse::<usize>().map_err(|e| StoreError::Corrupt {
                    id: "index_meta.dimensions".into(),
                    reason: e.to_string(),
                })?;
                if expected != self.dimensions {
                    return Err(StoreError::Dimension {
                        expected,
                        actual: self.dimensions,
                    });
                }
            }
            None => {
                sqlx::query("INSERT INTO index_meta (key, value) VALUES ('dimensions', ?)")
                    .bind(self.dimensions.to_string())
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}

fn where_clause(filter: Option<&Filter>) -> String {
    match filter {
        Some(f) if !f.is_empty() => {
            let parts: Vec<String> = f
                .conditions()
                .iter()
                .map(|c| format!("{} = ?", c.column.as_str()))
                .collect();
            format!(" WHERE {}", parts.join(" AND "))
        }
        _ => String::new(),
    }
}

fn bind_filter<'q>(mut query: SqliteQuery<'q>, filter: Option<&Filter>) -> SqliteQuery<'q> {
    if let Some(f) = filter {
        for condition in f.conditions() {
            query = match &condition.value {
                FieldValue::Text(s) => query.bind(s.clone()),
                FieldValue::Integer(i) => query.bind(*i),
            };
        }
    }
    query
}

pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_scored(row: &SqliteRow, query: &[f32]) -> Result<ScoredRecord, StoreError> {
    let blob: Vec<u8> = row.try_get("vector")?;
    let record = IndexRecord {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        path: row.try_get("path")?,
        start_line: row.try_get("start_line")?,
        end_line: row.try_get("end_line")?,
        kind: row.try_get("type")?,
        vector: Vec::new(),
        file_hash: row.try_get("file_hash")?,
    };
    Ok(record.scored(cosine_distance(query, &blob_to_vector(&blob))))
}

fn row_to_projection(row: &SqliteRow, columns: &[Column]) -> Result<Row, StoreError> {
    let mut out = Row::new();
    for &column in columns {
        let name = column.as_str();
        let value = match column {
            Column::StartLine | Column::EndLine => serde_json::Value::from(row.try_get::<i64, _>(name)?),
            Column::Vector => {
                let blob: Vec<u8> = row.try_get(name)?;
                serde_json::Value::from(blob_to_vector(&blob))
            }
            Column::Id | Column::Text | Column::Path | Column::Kind | Column::FileHash => {
                serde_json::Value::String(row.try_get::<String, _>(name)?)
            }
        };
        out.insert(name.to_owned(), value);
    }
    Ok(out)
}

impl VectorIndex for SqliteIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn insert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            check_dimensions(self.dimensions, &records)?;
            if records.is_empty() {
                return Ok(());
            }
            let mut tx = self.pool.begin().await?;
            for record in &records {
                sqlx::query(
                    "INSERT OR REPLACE INTO code_context \
                     (id, text, path, start_line, end_line, type, vector, file_hash) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&record.id)
                .bind(&record.text)
                .bind(&record.path)
                .bind(record.start_line)
                .bind(record.end_line)
                .bind(&record.kind)
                .bind(vector_to_blob(&record.vector))
                .bind(&record.file_hash)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn delete(&self, filter: Filter) -> BoxFuture<'_, Result<usize, StoreError>> {
        Box::pin(async move {
            let sql = format!("DELETE FROM {TABLE}{}", where_clause(Some(&filter)));
            let result = bind_filter(sqlx::query(&sql), Some(&filter))
                .execute(&self.pool)
                .await?;
            Ok(usize::try_from(result.rows_affected())?)
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<Filter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, StoreError>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {SCALAR_COLUMNS}, vector FROM {TABLE}{} ORDER BY rowid",
                where_clause(filter.as_ref())
            );
            let rows = bind_filter(sqlx::query(&sql), filter.as_ref())
                .fetch_all(&self.pool)
                .await?;
            let scored = rows
                .iter()
                .map(|row| row_to_scored(row, &vector))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rank(scored, limit))
        })
    }

    fn select(&self, select: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
        Box::pin(async move {
            if select.columns.is_empty() || select.limit == 0 {
                return Ok(Vec::new());
            }
            let columns: Vec<&str> = select.columns.iter().map(|c| c.as_str()).collect();
            let sql = format!(
                "SELECT {} FROM {TABLE}{} ORDER BY rowid LIMIT ?",
                columns.join(", "),
                where_clause(select.filter.as_ref())
            );
            let limit = i64::try_from(select.limit).unwrap_or(i64::MAX);
            let rows = bind_filter(sqlx::query(&sql), select.filter.as_ref())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            rows.iter()
                .map(|row| row_to_projection(row, &select.columns))
                .collect()
        })
    }

    fn paths(&self) -> BoxFuture<'_, Result<BTreeSet<String>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT DISTINCT path FROM code_context ORDER BY path")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(p,)| p).collect())
        })
    }
}
