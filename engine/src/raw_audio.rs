use audiomatch_vecstore::{Filter, Record};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::schema::{CollectionRole, RAW_AUDIO_PLACEHOLDER};

impl EngineContext {
    /// Records that reference `id` came from the upload stored as
    /// `filename`.
    pub async fn store_audio_blob(&self, filename: &str, id: i64) -> Result<(), EngineError> {
        self.retrying("raw_audio.insert", || {
            let col = self.ensure(CollectionRole::RawAudio)?;
            let rec = Record {
                id,
                vector: RAW_AUDIO_PLACEHOLDER.to_vec(),
                filename: Some(filename.to_string()),
            };
            col.insert(vec![rec])?;
            Ok(())
        })
        .await?;
        tracing::debug!(id, filename, "engine: raw-audio entry stored");
        Ok(())
    }

    /// Looks up the filename recorded for reference `id`. An absent
    /// collection or id yields `None`.
    pub async fn resolve_filename(&self, id: i64) -> Result<Option<String>, EngineError> {
        self.retrying("raw_audio.query", || {
            let Some(col) = self.existing(CollectionRole::RawAudio)? else {
                return Ok(None);
            };
            Ok(col
                .query(&Filter::id(id))?
                .into_iter()
                .next()
                .and_then(|r| r.filename))
        })
        .await
    }
}
