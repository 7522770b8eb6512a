use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use audiomatch_kv::SharedKVStore;
use parking_lot::{Mutex, RwLock};

use crate::error::VecError;
use crate::filter::Filter;
use crate::index::{IndexParams, SearchParams, Snapshot};
use crate::keys::{index_key, record_key, record_prefix, schema_key};
use crate::record::{Hit, Record};
use crate::schema::CollectionSchema;

/// Lifecycle state of an existing collection. The absent state is
/// represented by [`crate::VectorDb::collection`] returning `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// Created and accepting inserts, not search-ready.
    Unindexed,
    /// An index snapshot is loaded and searches are served from it.
    Indexed,
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unindexed => write!(f, "unindexed"),
            Self::Indexed => write!(f, "indexed"),
        }
    }
}

struct Inner {
    records: BTreeMap<i64, Record>,
    /// Ids in insertion order. Snapshots cover a prefix of it.
    order: Vec<i64>,
    /// Bumped on every successful insert; snapshots remember the version
    /// they were built from.
    version: u64,
    index: Option<IndexParams>,
    snapshot: Option<Arc<Snapshot>>,
    dropped: bool,
}

/// A named, schema-typed container of records.
///
/// Records are persisted to the KV store before they become visible in
/// memory. Searches are answered from the last loaded snapshot; inserts
/// made after that snapshot stay invisible to search until the next
/// [`Collection::load`] or [`Collection::ensure_indexed`].
///
/// All writers go through one mutex, so id assignment by record count is
/// race free.
pub struct Collection {
    name: String,
    schema: CollectionSchema,
    store: SharedKVStore,
    inner: RwLock<Inner>,
    writer: Mutex<()>,
}

impl Collection {
    /// Persists `schema` and returns an empty collection.
    pub(crate) fn create(
        name: &str,
        schema: CollectionSchema,
        store: SharedKVStore,
    ) -> Result<Self, VecError> {
        let data = rmp_serde::to_vec_named(&schema)?;
        store.set(&schema_key(name), &data)?;
        tracing::info!(collection = name, dim = schema.dim(), "vecstore: collection created");
        Ok(Self::from_parts(name, schema, store, BTreeMap::new(), None))
    }

    /// Loads an existing collection's index declaration and records.
    pub(crate) fn open(
        name: &str,
        schema: CollectionSchema,
        store: SharedKVStore,
    ) -> Result<Self, VecError> {
        let index = match store.get(&index_key(name))? {
            Some(data) => Some(rmp_serde::from_slice::<IndexParams>(&data)?),
            None => None,
        };

        let mut records = BTreeMap::new();
        for (_key, value) in store.scan(&record_prefix(name))? {
            let rec: Record = rmp_serde::from_slice(&value)?;
            records.insert(rec.id, rec);
        }
        tracing::debug!(collection = name, records = records.len(), "vecstore: collection opened");
        Ok(Self::from_parts(name, schema, store, records, index))
    }

    fn from_parts(
        name: &str,
        schema: CollectionSchema,
        store: SharedKVStore,
        records: BTreeMap<i64, Record>,
        index: Option<IndexParams>,
    ) -> Self {
        Self {
            name: name.to_string(),
            schema,
            store,
            inner: RwLock::new(Inner {
                order: records.keys().copied().collect(),
                records,
                version: 0,
                index,
                snapshot: None,
                dropped: false,
            }),
            writer: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn dim(&self) -> usize {
        self.schema.dim()
    }

    /// Number of stored records.
    pub fn num_entities(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_entities() == 0
    }

    pub fn state(&self) -> CollectionState {
        if self.inner.read().snapshot.is_some() {
            CollectionState::Indexed
        } else {
            CollectionState::Unindexed
        }
    }

    /// True when records were inserted after the loaded snapshot was built.
    pub fn is_stale(&self) -> bool {
        let inner = self.inner.read();
        inner
            .snapshot
            .as_ref()
            .is_some_and(|s| s.version != inner.version)
    }

    /// The declared index, if any.
    pub fn index_params(&self) -> Option<IndexParams> {
        self.inner.read().index
    }

    /// Inserts records with caller-chosen ids.
    ///
    /// Every record is validated before anything is written: on error the
    /// collection is unchanged.
    pub fn insert(&self, records: Vec<Record>) -> Result<Vec<i64>, VecError> {
        let _w = self.writer.lock();
        self.write_records(records)
    }

    /// Inserts one record whose id is the current record count, advanced
    /// past any id already claimed explicitly.
    pub fn insert_auto(&self, vector: Vec<f32>, filename: Option<String>) -> Result<i64, VecError> {
        let _w = self.writer.lock();
        let id = {
            let inner = self.inner.read();
            let mut id = inner.records.len() as i64;
            while inner.records.contains_key(&id) {
                id += 1;
            }
            id
        };
        let rec = Record {
            id,
            vector,
            filename,
        };
        self.write_records(vec![rec])?;
        Ok(id)
    }

    /// Caller must hold `self.writer`.
    fn write_records(&self, records: Vec<Record>) -> Result<Vec<i64>, VecError> {
        {
            let inner = self.inner.read();
            self.check_live(&inner)?;
            let mut seen = std::collections::HashSet::with_capacity(records.len());
            for rec in &records {
                self.validate(rec)?;
                if inner.records.contains_key(&rec.id) || !seen.insert(rec.id) {
                    return Err(VecError::DuplicateId(rec.id));
                }
            }
        }
        if records.is_empty() {
            return Ok(vec![]);
        }

        let mut encoded = Vec::with_capacity(records.len());
        for rec in &records {
            encoded.push((record_key(&self.name, rec.id), rmp_serde::to_vec_named(rec)?));
        }
        let entries: Vec<(&str, &[u8])> = encoded
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        self.store.batch_set(&entries)?;

        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let mut inner = self.inner.write();
        for rec in records {
            inner.order.push(rec.id);
            inner.records.insert(rec.id, rec);
        }
        inner.version += 1;
        tracing::debug!(collection = %self.name, ids = ?ids, "vecstore: inserted");
        Ok(ids)
    }

    fn validate(&self, rec: &Record) -> Result<(), VecError> {
        let want = self.schema.dim();
        if rec.vector.len() != want {
            return Err(VecError::DimensionMismatch {
                got: rec.vector.len(),
                want,
            });
        }
        if let (Some(name), Some(max)) = (&rec.filename, self.schema.filename_max_length()) {
            if name.len() > max {
                return Err(VecError::FilenameTooLong {
                    len: name.len(),
                    max,
                });
            }
        }
        Ok(())
    }

    fn check_live(&self, inner: &Inner) -> Result<(), VecError> {
        if inner.dropped {
            return Err(VecError::CollectionNotFound(self.name.clone()));
        }
        Ok(())
    }

    /// Declares the index used by [`Collection::load`]. Declaring different
    /// parameters replaces the previous declaration and unloads the current
    /// snapshot.
    pub fn create_index(&self, params: IndexParams) -> Result<(), VecError> {
        let _w = self.writer.lock();
        {
            let inner = self.inner.read();
            self.check_live(&inner)?;
            if inner.index == Some(params) {
                return Ok(());
            }
        }
        let data = rmp_serde::to_vec_named(&params)?;
        self.store.set(&index_key(&self.name), &data)?;

        let mut inner = self.inner.write();
        inner.index = Some(params);
        inner.snapshot = None;
        tracing::info!(collection = %self.name, index = ?params.kind, "vecstore: index declared");
        Ok(())
    }

    /// Builds a search snapshot from the declared index and the current
    /// records. Fails with `NotIndexed` when no index was declared.
    ///
    /// The build itself runs without holding the collection lock, so
    /// inserts and searches against the previous snapshot carry on.
    pub fn load(&self) -> Result<(), VecError> {
        let pending = self.begin_load()?;
        let snapshot = pending.build();
        self.publish(snapshot)
    }

    /// Captures what the next snapshot needs: the previous snapshot and
    /// the records inserted since.
    fn begin_load(&self) -> Result<PendingLoad, VecError> {
        let inner = self.inner.read();
        self.check_live(&inner)?;
        let params = inner
            .index
            .ok_or_else(|| VecError::NotIndexed(self.name.clone()))?;
        let base = inner.snapshot.clone();
        let covered = base.as_ref().map_or(0, |b| b.len());
        let added = inner
            .order
            .get(covered..)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| {
                inner
                    .records
                    .get(id)
                    .map(|r| (*id, Arc::from(r.vector.as_slice())))
            })
            .collect();
        Ok(PendingLoad {
            params,
            version: inner.version,
            base,
            added,
        })
    }

    fn publish(&self, snapshot: Snapshot) -> Result<(), VecError> {
        let mut inner = self.inner.write();
        self.check_live(&inner)?;
        tracing::info!(
            collection = %self.name,
            records = snapshot.len(),
            clustered = snapshot.is_clustered(),
            trained_on = ?snapshot.trained_on(),
            "vecstore: loaded"
        );
        // A concurrent load may already have published a newer snapshot.
        if inner
            .snapshot
            .as_ref()
            .is_none_or(|s| s.version <= snapshot.version)
        {
            inner.snapshot = Some(Arc::new(snapshot));
        }
        Ok(())
    }

    /// Declares `params` if no index exists, then loads unless a fresh
    /// snapshot is already in place. Idempotent.
    pub fn ensure_indexed(&self, params: IndexParams) -> Result<(), VecError> {
        if self.index_params().is_none() {
            self.create_index(params)?;
        }
        let fresh = {
            let inner = self.inner.read();
            self.check_live(&inner)?;
            inner
                .snapshot
                .as_ref()
                .is_some_and(|s| s.version == inner.version)
        };
        if fresh {
            return Ok(());
        }
        self.load()
    }

    /// Returns up to `k` records closest to `query`, closest first.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        params: &SearchParams,
    ) -> Result<Vec<Hit>, VecError> {
        let want = self.schema.dim();
        if query.len() != want {
            return Err(VecError::DimensionMismatch {
                got: query.len(),
                want,
            });
        }
        let snapshot = {
            let inner = self.inner.read();
            self.check_live(&inner)?;
            inner
                .snapshot
                .clone()
                .ok_or_else(|| VecError::NotIndexed(self.name.clone()))?
        };
        Ok(snapshot.search(query, k, params))
    }

    /// Returns every record matching `filter`, ascending by id.
    pub fn query(&self, filter: &Filter) -> Result<Vec<Record>, VecError> {
        let inner = self.inner.read();
        self.check_live(&inner)?;
        if let Some(id) = filter.point_id() {
            return Ok(inner.records.get(&id).cloned().into_iter().collect());
        }
        Ok(inner
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    /// Point lookup by primary key.
    pub fn get(&self, id: i64) -> Result<Option<Record>, VecError> {
        Ok(self.query(&Filter::id(id))?.into_iter().next())
    }

    /// Detaches this handle after its collection was dropped.
    pub(crate) fn mark_dropped(&self) {
        let _w = self.writer.lock();
        let mut inner = self.inner.write();
        inner.dropped = true;
        inner.records.clear();
        inner.order.clear();
        inner.snapshot = None;
    }
}

/// Inputs of a snapshot build, detached from the collection lock.
struct PendingLoad {
    params: IndexParams,
    version: u64,
    base: Option<Arc<Snapshot>>,
    added: Vec<(i64, Arc<[f32]>)>,
}

impl PendingLoad {
    fn build(self) -> Snapshot {
        Snapshot::build(&self.params, self.base.as_deref(), self.added, self.version)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("dim", &self.schema.dim())
            .field("records", &self.num_entities())
            .field("state", &self.state())
            .finish()
    }
}
