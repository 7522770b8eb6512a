//! Canonical collections and their schemas.

use std::fmt;
use std::str::FromStr;

use audiomatch_vecstore::{CollectionSchema, FieldSchema, IndexParams};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Dimension of the raw-audio index placeholder vector.
pub const RAW_AUDIO_DIM: usize = 2;

/// Vector stored in every raw-audio record; that collection is never
/// searched by similarity.
pub const RAW_AUDIO_PLACEHOLDER: [f32; RAW_AUDIO_DIM] = [0.0, 0.0];

/// The three collections the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionRole {
    /// Long-term reference embeddings, the match targets.
    Reference,
    /// Short-term log of every query embedding.
    QueryLog,
    /// Id to filename lookup for reference uploads.
    RawAudio,
}

impl CollectionRole {
    pub const ALL: [CollectionRole; 3] = [
        CollectionRole::Reference,
        CollectionRole::QueryLog,
        CollectionRole::RawAudio,
    ];

    pub fn collection_name(self, cfg: &EngineConfig) -> &str {
        match self {
            CollectionRole::Reference => &cfg.reference_collection,
            CollectionRole::QueryLog => &cfg.query_log_collection,
            CollectionRole::RawAudio => &cfg.raw_audio_collection,
        }
    }

    pub fn schema(self, cfg: &EngineConfig) -> CollectionSchema {
        match self {
            CollectionRole::Reference | CollectionRole::QueryLog => CollectionSchema::new(
                vec![
                    FieldSchema::primary("id"),
                    FieldSchema::vector("vector", cfg.dim),
                    FieldSchema::varchar("filename", cfg.filename_max_length),
                ],
                match self {
                    CollectionRole::Reference => "long-term reference audio embeddings",
                    _ => "short-term query audio embeddings",
                },
            ),
            CollectionRole::RawAudio => CollectionSchema::new(
                vec![
                    FieldSchema::primary("id"),
                    FieldSchema::varchar("filename", cfg.filename_max_length),
                    FieldSchema::vector("dummy_vector", RAW_AUDIO_DIM),
                ],
                "raw audio filename index",
            ),
        }
    }

    /// Index declared at creation, `None` for collections never searched.
    pub fn index(self, cfg: &EngineConfig) -> Option<IndexParams> {
        match self {
            CollectionRole::Reference | CollectionRole::QueryLog => {
                Some(IndexParams::ivf_flat(cfg.nlist))
            }
            CollectionRole::RawAudio => None,
        }
    }
}

impl fmt::Display for CollectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionRole::Reference => write!(f, "reference"),
            CollectionRole::QueryLog => write!(f, "query_log"),
            CollectionRole::RawAudio => write!(f, "raw_audio"),
        }
    }
}

/// Retention tier chosen by the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    LongTerm,
    ShortTerm,
}

impl Tier {
    pub fn role(self) -> CollectionRole {
        match self {
            Tier::LongTerm => CollectionRole::Reference,
            Tier::ShortTerm => CollectionRole::QueryLog,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::LongTerm => write!(f, "long_term"),
            Tier::ShortTerm => write!(f, "short_term"),
        }
    }
}

impl FromStr for Tier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long_term" | "long" | "reference" => Ok(Tier::LongTerm),
            "short_term" | "short" | "query" => Ok(Tier::ShortTerm),
            other => Err(EngineError::InvalidRecord(format!("unknown tier {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_schemas_validate() {
        let cfg = EngineConfig::default();
        for role in CollectionRole::ALL {
            role.schema(&cfg).validate().unwrap();
        }
        assert_eq!(CollectionRole::Reference.schema(&cfg).dim(), 768);
        assert_eq!(CollectionRole::RawAudio.schema(&cfg).dim(), 2);
        assert_eq!(
            CollectionRole::RawAudio.schema(&cfg).filename_max_length(),
            Some(255)
        );
    }

    #[test]
    fn only_vector_collections_are_indexed() {
        let cfg = EngineConfig::default();
        assert_eq!(
            CollectionRole::Reference.index(&cfg),
            Some(IndexParams::ivf_flat(128))
        );
        assert!(CollectionRole::RawAudio.index(&cfg).is_none());
    }

    #[test]
    fn tiers_parse() {
        assert_eq!("long_term".parse::<Tier>().unwrap(), Tier::LongTerm);
        assert_eq!("short".parse::<Tier>().unwrap().role(), CollectionRole::QueryLog);
        assert!("medium".parse::<Tier>().is_err());
    }
}
