//! Parameterized predicates and projections over [`IndexRecord`](crate::IndexRecord) columns.
//!
//! Values never get spliced into query text: backends bind them as parameters
//! or compare them in memory.

use crate::record::IndexRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Text,
    Path,
    StartLine,
    EndLine,
    Kind,
    Vector,
    FileHash,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Id,
        Column::Text,
        Column::Path,
        Column::StartLine,
        Column::EndLine,
        Column::Kind,
        Column::Vector,
        Column::FileHash,
    ];

    /// Column name in the persisted schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Text => "text",
            Self::Path => "path",
            Self::StartLine => "start_line",
            Self::EndLine => "end_line",
            Self::Kind => "type",
            Self::Vector => "vector",
            Self::FileHash => "file_hash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Integer(i) => serde_json::Value::from(i),
            FieldValue::Text(s) => serde_json::Value::String(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: Column,
    pub value: FieldValue,
}

/// Conjunction of exact-match conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    #[must_use]
    pub fn eq(column: Column, value: impl Into<FieldValue>) -> Self {
        Self::default().and_eq(column, value)
    }

    /// Shorthand for `path == value`.
    #[must_use]
    pub fn path(value: impl Into<FieldValue>) -> Self {
        Self::eq(Column::Path, value)
    }

    #[must_use]
    pub fn and_eq(mut self, column: Column, value: impl Into<FieldValue>) -> Self {
        self.conditions.push(Condition {
            column,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn matches(&self, record: &IndexRecord) -> bool {
        self.conditions
            .iter()
            .all(|c| record.field(c.column).as_ref() == Some(&c.value))
    }
}

/// A projected, filtered, limited read.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: Vec<Column>,
    pub filter: Option<Filter>,
    pub limit: usize,
}

impl Select {
    /// Every column of every record.
    #[must_use]
    pub fn all() -> Self {
        Self {
            columns: Column::ALL.to_vec(),
            filter: None,
            limit: usize::MAX,
        }
    }

    #[must_use]
    pub fn columns(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            ..Self::all()
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn needs_vector(&self) -> bool {
        self.columns.contains(&Column::Vector)
    }
}
