use std::fmt;

use audiomatch_vecstore::Hit;
use serde::Serialize;

use crate::blob::sanitize_filename;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::schema::CollectionRole;

/// Progress of one match request, reported through tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Received,
    Embedded,
    Searched,
    Logged,
    MatchFound,
    NoMatch,
    Failed,
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchStage::Received => "received",
            MatchStage::Embedded => "embedded",
            MatchStage::Searched => "searched",
            MatchStage::Logged => "logged",
            MatchStage::MatchFound => "match_found",
            MatchStage::NoMatch => "no_match",
            MatchStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Closest reference to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMatch {
    pub id: i64,
    /// Euclidean distance between the query and reference embeddings.
    pub distance: f32,
    /// Upload the reference came from, when it was recorded.
    pub filename: Option<String>,
}

/// Result of a match. `best` is `None` when the reference store is empty
/// or absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    /// Id the query was logged under.
    pub query_id: i64,
    pub best: Option<BestMatch>,
}

impl MatchOutcome {
    pub fn stage(&self) -> MatchStage {
        if self.best.is_some() {
            MatchStage::MatchFound
        } else {
            MatchStage::NoMatch
        }
    }
}

impl EngineContext {
    /// Finds the reference closest to `audio` and logs the query.
    ///
    /// Every successful call adds exactly one query-log record, whether or
    /// not a match is found. An embedding failure aborts before anything
    /// is written.
    pub async fn match_audio(
        &self,
        audio: &[u8],
        filename: Option<&str>,
    ) -> Result<MatchOutcome, EngineError> {
        tracing::debug!(stage = %MatchStage::Received, bytes = audio.len(), "engine: match");

        let vector = match self.embedder.embed(audio).await {
            Ok(v) if v.len() == self.cfg.dim => v,
            Ok(v) => {
                let err = EngineError::DimensionMismatch {
                    got: v.len(),
                    want: self.cfg.dim,
                };
                tracing::warn!(stage = %MatchStage::Failed, error = %err, "engine: match");
                return Err(err);
            }
            Err(e) => {
                tracing::warn!(stage = %MatchStage::Failed, error = %e, "engine: match");
                return Err(e.into());
            }
        };
        tracing::debug!(stage = %MatchStage::Embedded, "engine: match");

        let hit = self.search_reference(&vector).await?;
        tracing::debug!(stage = %MatchStage::Searched, hit = ?hit, "engine: match");

        let filename = filename.and_then(sanitize_filename);
        let query_id = self.log_query(&vector, filename.as_deref()).await?;
        tracing::debug!(stage = %MatchStage::Logged, query_id, "engine: match");

        if let Some(name) = &filename {
            if self.blobs.put(name, audio).await? {
                tracing::warn!(query_id, filename = %name, "engine: upload replaced an earlier file of the same name");
            }
        }

        let best = match hit {
            Some(Hit { id, distance }) => {
                let filename = match self.resolve_filename(id).await {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!(id, error = %e, "engine: filename lookup failed");
                        None
                    }
                };
                Some(BestMatch {
                    id,
                    distance,
                    filename,
                })
            }
            None => None,
        };

        let outcome = MatchOutcome { query_id, best };
        match &outcome.best {
            Some(b) => tracing::info!(
                stage = %outcome.stage(),
                query_id,
                id = b.id,
                distance = b.distance,
                filename = ?b.filename,
                "engine: match"
            ),
            None => tracing::info!(stage = %outcome.stage(), query_id, "engine: match"),
        }
        Ok(outcome)
    }

    /// Nearest reference, or `None` if the reference store is absent or
    /// empty. Loads a missing or stale snapshot first.
    async fn search_reference(&self, vector: &[f32]) -> Result<Option<Hit>, EngineError> {
        let role = CollectionRole::Reference;
        let params = role.index(&self.cfg).unwrap_or_default();
        let search = &self.search_params();
        self.retrying_async("match.search", move || async move {
            let Some(col) = self.existing(role)? else {
                return Ok(None);
            };
            self.refresh_index(col.clone(), params).await?;
            Ok(col.search(vector, 1, search)?.into_iter().next())
        })
        .await
    }

    /// Appends to the query log. Its index was declared when the collection
    /// was created and is only loaded when the log is searched.
    async fn log_query(&self, vector: &[f32], filename: Option<&str>) -> Result<i64, EngineError> {
        let role = CollectionRole::QueryLog;
        self.retrying("match.log", || {
            let col = self.ensure(role)?;
            Ok(col.insert_auto(vector.to_vec(), filename.map(str::to_string))?)
        })
        .await
    }
}
