//! Schema-typed vector collections with Euclidean nearest-neighbor search.
//!
//! A [`VectorDb`] is a catalog of named [`Collection`]s persisted through
//! an `audiomatch-kv` store. Each collection has a fixed schema (an Int64
//! primary key, one float vector of fixed dimension, an optional bounded
//! filename) and goes through two states:
//!
//! - unindexed: records can be inserted and queried by field
//! - indexed: an index snapshot is loaded and similarity search is served
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use audiomatch_kv::MemoryStore;
//! use audiomatch_vecstore::{
//!     CollectionSchema, FieldSchema, IndexParams, Record, SearchParams, VectorDb,
//! };
//!
//! let db = VectorDb::open(Arc::new(MemoryStore::new()));
//! let schema = CollectionSchema::new(
//!     vec![FieldSchema::primary("id"), FieldSchema::vector("vector", 2)],
//!     "points",
//! );
//! let points = db.ensure_collection("points", &schema).unwrap();
//! points.insert(vec![Record::new(0, vec![0.0, 0.0])]).unwrap();
//! points.ensure_indexed(IndexParams::default()).unwrap();
//!
//! let hits = points.search(&[3.0, 4.0], 1, &SearchParams::default()).unwrap();
//! assert_eq!(hits[0].id, 0);
//! assert_eq!(hits[0].distance, 5.0);
//! ```

pub mod collection;
pub mod database;
pub mod distance;
pub mod error;
pub mod filter;
pub mod index;
pub mod ivf;
mod keys;
pub mod record;
pub mod schema;

pub use collection::{Collection, CollectionState};
pub use database::VectorDb;
pub use distance::{l2_distance, l2_squared};
pub use error::VecError;
pub use filter::{Field, Filter, Value};
pub use index::{IndexKind, IndexParams, Metric, SearchParams};
pub use record::{Hit, Record};
pub use schema::{CollectionSchema, DataType, FieldSchema};
