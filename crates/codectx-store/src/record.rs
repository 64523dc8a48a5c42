use serde::{Deserialize, Serialize};

use crate::filter::{Column, FieldValue};

/// One projected row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A persisted fragment with its embedding.
///
/// `file_hash` is the digest of the whole source file the fragment came from,
/// so every record of one path shares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub text: String,
    pub path: String,
    pub start_line: i32,
    pub end_line: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub vector: Vec<f32>,
    pub file_hash: String,
}

impl IndexRecord {
    /// Value of a scalar column. `None` for [`Column::Vector`].
    #[must_use]
    pub fn field(&self, column: Column) -> Option<FieldValue> {
        match column {
            Column::Id => Some(FieldValue::Text(self.id.clone())),
            Column::Text => Some(FieldValue::Text(self.text.clone())),
            Column::Path => Some(FieldValue::Text(self.path.clone())),
            Column::StartLine => Some(FieldValue::Integer(i64::from(self.start_line))),
            Column::EndLine => Some(FieldValue::Integer(i64::from(self.end_line))),
            Column::Kind => Some(FieldValue::Text(self.kind.clone())),
            Column::FileHash => Some(FieldValue::Text(self.file_hash.clone())),
            Column::Vector => None,
        }
    }

    /// Build a row containing only the requested columns, in request order.
    #[must_use]
    pub fn project(&self, columns: &[Column]) -> Row {
        let mut row = Row::new();
        for &column in columns {
            let value = match self.field(column) {
                Some(v) => v.into(),
                None => serde_json::Value::from(self.vector.clone()),
            };
            row.insert(column.as_str().to_owned(), value);
        }
        row
    }

    #[must_use]
    pub fn scored(&self, distance: f32) -> ScoredRecord {
        ScoredRecord {
            id: self.id.clone(),
            text: self.text.clone(),
            path: self.path.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
            kind: self.kind.clone(),
            file_hash: self.file_hash.clone(),
            distance,
        }
    }
}

/// A search hit. `distance` is the cosine distance to the query, in `[0, 2]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    pub path: String,
    pub start_line: i32,
    pub end_line: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_hash: String,
    pub distance: f32,
}
