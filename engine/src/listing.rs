use std::collections::BTreeSet;

use audiomatch_vecstore::Filter;
use serde::Serialize;

use crate::blob::sanitize_filename;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::schema::CollectionRole;

/// Record count per collection; `None` for an absent collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub reference: Option<usize>,
    pub query_log: Option<usize>,
    pub raw_audio: Option<usize>,
}

impl EngineContext {
    /// Filenames recorded in the reference store and the query log,
    /// sorted and deduplicated.
    pub async fn list_filenames(&self) -> Result<Vec<String>, EngineError> {
        self.retrying("list_filenames", || {
            let mut names = BTreeSet::new();
            for role in [CollectionRole::Reference, CollectionRole::QueryLog] {
                if let Some(col) = self.existing(role)? {
                    names.extend(col.query(&Filter::All)?.into_iter().filter_map(|r| r.filename));
                }
            }
            Ok(names.into_iter().collect())
        })
        .await
    }

    /// Bytes of a stored upload.
    pub async fn fetch_audio(&self, filename: &str) -> Result<Option<Vec<u8>>, EngineError> {
        match sanitize_filename(filename) {
            Some(name) if name == filename => self.blobs.get(&name).await,
            _ => Ok(None),
        }
    }

    pub fn counts(&self) -> Result<CollectionCounts, EngineError> {
        let count = |role| -> Result<Option<usize>, EngineError> {
            Ok(self.existing(role)?.map(|c| c.num_entities()))
        };
        Ok(CollectionCounts {
            reference: count(CollectionRole::Reference)?,
            query_log: count(CollectionRole::QueryLog)?,
            raw_audio: count(CollectionRole::RawAudio)?,
        })
    }
}
