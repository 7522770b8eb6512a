use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use audiomatch_embed::AudioEmbedder;
use audiomatch_vecstore::{Collection, CollectionState, IndexParams, SearchParams, VectorDb};
use parking_lot::Mutex;

use crate::blob::BlobStore;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::retry::with_retry_async;
use crate::schema::CollectionRole;

/// Dependencies of an [`EngineContext`].
pub struct EngineParts {
    pub db: VectorDb,
    pub embedder: Arc<dyn AudioEmbedder>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: EngineConfig,
}

/// The audio matching engine.
///
/// Holds the vector catalog, the embedder and the blob store, plus a cache
/// of collection handles so each collection is bootstrapped (created and
/// given its index) at most once per engine lifetime. A reset clears the
/// cache. Safe for concurrent use.
pub struct EngineContext {
    pub(crate) db: VectorDb,
    pub(crate) embedder: Arc<dyn AudioEmbedder>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) cfg: EngineConfig,
    handles: Mutex<HashMap<CollectionRole, Arc<Collection>>>,
}

impl EngineContext {
    /// Fails with `DimensionMismatch` when the embedder's output does not
    /// fit the configured collections.
    pub fn new(parts: EngineParts) -> Result<Self, EngineError> {
        let EngineParts {
            db,
            embedder,
            blobs,
            config,
        } = parts;
        if embedder.dimension() != config.dim {
            return Err(EngineError::DimensionMismatch {
                got: embedder.dimension(),
                want: config.dim,
            });
        }
        tracing::info!(
            reference = %config.reference_collection,
            query_log = %config.query_log_collection,
            raw_audio = %config.raw_audio_collection,
            dim = config.dim,
            "engine: ready"
        );
        Ok(Self {
            db,
            embedder,
            blobs,
            cfg: config,
            handles: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn db(&self) -> &VectorDb {
        &self.db
    }

    pub fn collection_name(&self, role: CollectionRole) -> &str {
        role.collection_name(&self.cfg)
    }

    pub(crate) fn search_params(&self) -> SearchParams {
        SearchParams {
            nprobe: self.cfg.nprobe,
        }
    }

    /// Write-path accessor: returns the collection for `role`, creating it
    /// with the canonical schema and declaring its index if needed.
    pub(crate) fn ensure(&self, role: CollectionRole) -> Result<Arc<Collection>, EngineError> {
        let mut handles = self.handles.lock();
        if let Some(c) = handles.get(&role) {
            return Ok(c.clone());
        }

        let name = role.collection_name(&self.cfg);
        let c = self.db.ensure_collection(name, &role.schema(&self.cfg))?;
        if let Some(params) = role.index(&self.cfg) {
            if c.index_params().is_none() {
                c.create_index(params)?;
            }
        }
        tracing::debug!(%role, collection = name, records = c.num_entities(), "engine: collection ready");
        handles.insert(role, c.clone());
        Ok(c)
    }

    /// Read-path accessor: returns the collection for `role` only if it
    /// already exists. Never creates anything.
    pub(crate) fn existing(
        &self,
        role: CollectionRole,
    ) -> Result<Option<Arc<Collection>>, EngineError> {
        if let Some(c) = self.handles.lock().get(&role) {
            return Ok(Some(c.clone()));
        }
        Ok(self.db.collection(role.collection_name(&self.cfg))?)
    }

    /// Drops the cached handle so the next access bootstraps again.
    pub(crate) fn forget(&self, role: CollectionRole) {
        self.handles.lock().remove(&role);
    }

    /// Runs a collection operation with the configured retry policy. A
    /// failed attempt evicts cached handles so a retry after a concurrent
    /// reset sees the recreated collection.
    pub(crate) async fn retrying<T, F>(&self, op: &str, mut f: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Result<T, EngineError>,
    {
        self.retrying_async(op, || std::future::ready(f())).await
    }

    /// [`Self::retrying`] for attempts that await.
    pub(crate) async fn retrying_async<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        with_retry_async(&self.cfg.retry, op, || {
            let attempt = f();
            async move {
                let out = attempt.await;
                if matches!(out, Err(ref e) if e.is_retryable()) {
                    self.handles.lock().clear();
                }
                out
            }
        })
        .await
    }

    /// Brings the snapshot of `col` up to date. Building it can mean
    /// clustering every vector, so it runs on the blocking pool.
    pub(crate) async fn refresh_index(
        &self,
        col: Arc<Collection>,
        params: IndexParams,
    ) -> Result<(), EngineError> {
        if col.state() == CollectionState::Indexed && !col.is_stale() {
            return Ok(());
        }
        tokio::task::spawn_blocking(move || col.ensure_indexed(params))
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))??;
        Ok(())
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.cfg)
            .field("db", &self.db)
            .finish()
    }
}
