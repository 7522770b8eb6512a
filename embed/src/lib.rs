//! Audio embedding providers.
//!
//! An [`AudioEmbedder`] turns an encoded clip into a fixed-length vector.
//! Two implementations are provided:
//!
//! - [`FbankEmbedder`]: local, deterministic, pooled log-mel statistics
//!   (768 dimensions with the default filterbank)
//! - [`HttpEmbedder`]: delegates to a remote embedding service

pub mod config;
pub mod embed;
pub mod error;
pub mod fbank;
pub mod fbank_embedder;
pub mod http;
pub mod resample;
pub mod wav;

pub use config::EmbedConfig;
pub use embed::{AudioEmbedder, l2_normalize};
pub use error::EmbedError;
pub use fbank_embedder::{FBANK_EMBEDDING_DIM, FbankEmbedder};
pub use http::HttpEmbedder;
