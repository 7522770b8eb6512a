use audiomatch_vecstore::Record;
use serde::Serialize;

use crate::blob::sanitize_filename;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::schema::{CollectionRole, Tier};

/// One upload to be registered.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub tier: Tier,
    /// Encoded clip (WAV).
    pub audio: Vec<u8>,
    /// Original upload name; sanitised before it is stored.
    pub filename: Option<String>,
    /// Caller-chosen id as received (text); auto-assigned when `None`.
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    pub tier: Tier,
    pub id: i64,
    pub filename: Option<String>,
}

/// Parse a caller-supplied id. Surrounding whitespace is ignored.
pub fn parse_id(raw: &str) -> Result<i64, EngineError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| EngineError::InvalidId(raw.to_string()))
}

impl EngineContext {
    /// Embeds a clip and stores it in the tier's collection.
    ///
    /// Nothing is written if embedding, id parsing or record validation
    /// fails. On success the collection has been re-indexed, so a later
    /// match observes the new record. Reference uploads are also recorded
    /// in the raw-audio index so matches can be traced to a filename.
    ///
    /// Uploads share one namespace of sanitised filenames: a later upload
    /// under the same name replaces the stored bytes, and every record
    /// registered under that name then resolves to the newest file.
    pub async fn ingest(&self, req: IngestRequest) -> Result<IngestReceipt, EngineError> {
        let IngestRequest {
            tier,
            audio,
            filename,
            id,
        } = req;
        let role = tier.role();

        let vector = self.embedder.embed(&audio).await?;
        if vector.len() != self.cfg.dim {
            return Err(EngineError::DimensionMismatch {
                got: vector.len(),
                want: self.cfg.dim,
            });
        }

        let explicit = id.as_deref().map(parse_id).transpose()?;
        let filename = match filename {
            Some(name) => Some(sanitize_filename(&name).ok_or_else(|| {
                EngineError::InvalidRecord(format!("unusable filename {name:?}"))
            })?),
            None => None,
        };

        let id = self
            .retrying("ingest.insert", || {
                let col = self.ensure(role)?;
                match explicit {
                    Some(id) => {
                        let rec = Record {
                            id,
                            vector: vector.clone(),
                            filename: filename.clone(),
                        };
                        col.insert(vec![rec])?;
                        Ok(id)
                    }
                    None => Ok(col.insert_auto(vector.clone(), filename.clone())?),
                }
            })
            .await?;

        if let Some(params) = role.index(&self.cfg) {
            self.retrying_async("ingest.index", move || async move {
                self.refresh_index(self.ensure(role)?, params).await
            })
            .await?;
        }
        tracing::info!(%tier, id, filename = ?filename, "engine: ingested");

        if let Some(name) = &filename {
            if self.blobs.put(name, &audio).await? {
                tracing::warn!(id, filename = %name, "engine: upload replaced an earlier file of the same name");
            }
            if role == CollectionRole::Reference {
                match self.store_audio_blob(name, id).await {
                    Ok(()) => {}
                    // Left over from a reference reset on its own.
                    Err(EngineError::DuplicateId(_)) => {
                        tracing::warn!(id, filename = %name, "engine: raw-audio entry already present");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(IngestReceipt { tier, id, filename })
    }
}
