//! Vector index storage for code context records.
//!
//! A [`VectorIndex`] is a keyed collection of [`IndexRecord`]s supporting batch
//! insert, delete by [`Filter`], projected selects, and k-nearest-neighbor search
//! by cosine distance.

pub mod error;
pub mod filter;
pub mod in_memory;
pub mod qdrant;
pub mod record;
pub mod sqlite;
pub mod vector_index;

pub use error::{Result, StoreError};
pub use filter::{Column, FieldValue, Filter, Select};
pub use in_memory::InMemoryIndex;
pub use qdrant::QdrantIndex;
pub use record::{IndexRecord, Row, ScoredRecord};
pub use sqlite::SqliteIndex;
pub use vector_index::{VectorIndex, cosine_distance};
