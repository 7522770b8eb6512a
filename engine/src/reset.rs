use serde::Serialize;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::schema::CollectionRole;

/// What happened to one collection during a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ResetStatus {
    /// Dropped and recreated empty with the canonical schema and index.
    Recreated,
    /// Did not exist and was left absent.
    Absent,
    /// Could not be reset; the other collections were still processed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionReset {
    pub role: CollectionRole,
    pub name: String,
    #[serde(flatten)]
    pub status: ResetStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum BlobReset {
    /// Number of uploads removed.
    Cleared(usize),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub collections: Vec<CollectionReset>,
    pub blobs: BlobReset,
}

impl ResetReport {
    pub fn is_complete(&self) -> bool {
        !matches!(self.blobs, BlobReset::Failed(_))
            && self
                .collections
                .iter()
                .all(|c| !matches!(c.status, ResetStatus::Failed(_)))
    }
}

impl EngineContext {
    /// Empties every collection that exists and every stored upload.
    ///
    /// Each collection is handled independently: a failure is recorded in
    /// the report and the next collection is still processed.
    pub async fn reset(&self) -> ResetReport {
        let mut collections = Vec::with_capacity(CollectionRole::ALL.len());
        for role in CollectionRole::ALL {
            let status = self.reset_collection(role).await;
            collections.push(CollectionReset {
                role,
                name: self.collection_name(role).to_string(),
                status,
            });
        }

        let blobs = match self.blobs.clear().await {
            Ok(n) => BlobReset::Cleared(n),
            Err(e) => {
                tracing::warn!(error = %e, "engine: reset: clearing uploads failed");
                BlobReset::Failed(e.to_string())
            }
        };

        let report = ResetReport { collections, blobs };
        tracing::info!(complete = report.is_complete(), "engine: reset done");
        report
    }

    /// Resets a single collection. Safe to call again after a failure.
    pub async fn reset_collection(&self, role: CollectionRole) -> ResetStatus {
        let name = self.collection_name(role).to_string();
        match self.recreate(role).await {
            Ok(true) => {
                tracing::info!(%role, collection = %name, "engine: reset: recreated");
                ResetStatus::Recreated
            }
            Ok(false) => {
                tracing::info!(%role, collection = %name, "engine: reset: does not exist");
                ResetStatus::Absent
            }
            Err(e) => {
                tracing::warn!(%role, collection = %name, error = %e, "engine: reset failed");
                ResetStatus::Failed(e.to_string())
            }
        }
    }

    /// Returns false when the collection was absent.
    ///
    /// Presence is decided once, before anything is touched. A failed
    /// attempt leaves the collection declared, so retries and later calls
    /// still see it and finish the job.
    async fn recreate(&self, role: CollectionRole) -> Result<bool, EngineError> {
        let name = self.collection_name(role).to_string();
        self.forget(role);
        let exists = self
            .retrying("reset.lookup", || Ok(self.db.has_collection(&name)?))
            .await?;
        if !exists {
            return Ok(false);
        }

        let schema = role.schema(&self.cfg);
        let index = role.index(&self.cfg);
        let col = self
            .retrying("reset", || {
                self.forget(role);
                let col = self.db.recreate_collection(&name, &schema)?;
                if let Some(params) = index {
                    col.create_index(params)?;
                }
                Ok(col)
            })
            .await?;
        if let Some(params) = index {
            self.refresh_index(col, params).await?;
        }
        Ok(true)
    }
}
