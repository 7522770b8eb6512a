//! Audio matching engine.
//!
//! Clips are embedded and kept in three correlated collections:
//!
//! - reference (long-term): the embeddings queries are matched against
//! - query log (short-term): every query embedding, logged unconditionally
//! - raw-audio index: reference id to uploaded filename
//!
//! [`EngineContext`] exposes the operations: [`EngineContext::ingest`],
//! [`EngineContext::match_audio`] and [`EngineContext::reset`], plus the
//! raw-audio correlation and listing helpers.

pub mod blob;
pub mod config;
pub mod context;
pub mod error;
pub mod ingest;
pub mod listing;
pub mod matching;
pub mod raw_audio;
pub mod reset;
pub mod retry;
pub mod schema;


pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, sanitize_filename};
pub use config::{EngineConfig, RetryConfig};
pub use context::{EngineContext, EngineParts};
pub use error::EngineError;
pub use ingest::{IngestReceipt, IngestRequest, parse_id};
pub use listing::CollectionCounts;
pub use matching::{BestMatch, MatchOutcome, MatchStage};
pub use reset::{BlobReset, CollectionReset, ResetReport, ResetStatus};
pub use schema::{CollectionRole, RAW_AUDIO_DIM, RAW_AUDIO_PLACEHOLDER, Tier};
