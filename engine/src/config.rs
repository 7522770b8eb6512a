use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine settings. Every field has a default, so a partial YAML section
/// is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Long-term reference collection.
    pub reference_collection: String,
    /// Short-term query log collection.
    pub query_log_collection: String,
    /// Raw-audio filename lookup collection.
    pub raw_audio_collection: String,

    /// Embedding dimension; must equal the embedder's.
    pub dim: usize,
    pub filename_max_length: usize,

    /// IVF clusters declared on the reference and query log.
    pub nlist: usize,
    /// IVF lists probed per search.
    pub nprobe: usize,

    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_collection: "long_term_collection".into(),
            query_log_collection: "short_term_collection".into(),
            raw_audio_collection: "wav_collection".into(),
            dim: 768,
            filename_max_length: 255,
            nlist: 128,
            nprobe: 10,
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff for transient collection failures: `base_delay_ms`, doubled on
/// every further attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1 << shift))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
        }
    }
}
