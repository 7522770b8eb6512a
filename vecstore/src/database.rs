use std::collections::HashMap;
use std::sync::Arc;

use audiomatch_kv::SharedKVStore;
use parking_lot::Mutex;

use crate::collection::Collection;
use crate::error::VecError;
use crate::keys::{
    collection_prefix, index_key, parse_schema_key, record_prefix, schema_key, valid_name,
};
use crate::schema::CollectionSchema;

/// Catalog of named collections over one KV store.
///
/// Collection handles are cached, so every caller asking for the same
/// name shares one [`Collection`] and its writer lock. Catalog changes
/// (create, drop) are serialized.
pub struct VectorDb {
    store: SharedKVStore,
    handles: Mutex<HashMap<String, Arc<Collection>>>,
}

impl VectorDb {
    pub fn open(store: SharedKVStore) -> Self {
        Self {
            store,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Reports whether `name` exists. Never creates anything.
    pub fn has_collection(&self, name: &str) -> Result<bool, VecError> {
        if self.handles.lock().contains_key(name) {
            return Ok(true);
        }
        Ok(self.store.contains(&schema_key(name))?)
    }

    /// Returns the collection `name`, creating it with `schema` if absent.
    ///
    /// An existing collection keeps its stored schema; asking for it with a
    /// different schema fails with [`VecError::SchemaMismatch`].
    pub fn ensure_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<Arc<Collection>, VecError> {
        if !valid_name(name) {
            return Err(VecError::InvalidSchema(format!(
                "invalid collection name {name:?}"
            )));
        }
        schema.validate()?;

        let mut handles = self.handles.lock();
        if let Some(c) = handles.get(name) {
            check_schema(name, c.schema(), schema)?;
            return Ok(c.clone());
        }

        let c = match self.load_schema(name)? {
            Some(stored) => {
                check_schema(name, &stored, schema)?;
                Collection::open(name, stored, self.store.clone())?
            }
            None => Collection::create(name, schema.clone(), self.store.clone())?,
        };
        let c = Arc::new(c);
        handles.insert(name.to_string(), c.clone());
        Ok(c)
    }

    /// Returns the collection `name` if it exists.
    pub fn collection(&self, name: &str) -> Result<Option<Arc<Collection>>, VecError> {
        let mut handles = self.handles.lock();
        if let Some(c) = handles.get(name) {
            return Ok(Some(c.clone()));
        }
        let Some(schema) = self.load_schema(name)? else {
            return Ok(None);
        };
        let c = Arc::new(Collection::open(name, schema, self.store.clone())?);
        handles.insert(name.to_string(), c.clone());
        Ok(Some(c))
    }

    /// Removes a collection with all of its records and index. Returns
    /// false if it did not exist. Outstanding handles become detached and
    /// report `CollectionNotFound`.
    pub fn drop_collection(&self, name: &str) -> Result<bool, VecError> {
        let mut handles = self.handles.lock();
        let cached = handles.remove(name);
        let existed = cached.is_some() || self.store.contains(&schema_key(name))?;
        if let Some(c) = cached {
            c.mark_dropped();
        }
        if !existed {
            return Ok(false);
        }
        let removed = self.store.delete_prefix(&collection_prefix(name))?;
        tracing::info!(collection = name, keys = removed, "vecstore: collection dropped");
        Ok(true)
    }

    /// Empties `name` and declares it afresh with `schema`, creating it if
    /// absent. Outstanding handles become detached.
    ///
    /// The schema key is overwritten last and never deleted, so a
    /// collection that existed still exists if this fails part way, and
    /// calling it again completes the job.
    pub fn recreate_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<Arc<Collection>, VecError> {
        if !valid_name(name) {
            return Err(VecError::InvalidSchema(format!(
                "invalid collection name {name:?}"
            )));
        }
        schema.validate()?;

        let mut handles = self.handles.lock();
        if let Some(c) = handles.remove(name) {
            c.mark_dropped();
        }
        let removed = self.store.delete_prefix(&record_prefix(name))?;
        self.store.delete(&index_key(name))?;
        let c = Arc::new(Collection::create(name, schema.clone(), self.store.clone())?);
        handles.insert(name.to_string(), c.clone());
        tracing::info!(collection = name, records = removed, "vecstore: collection recreated");
        Ok(c)
    }

    /// Names of all collections, sorted.
    pub fn list_collections(&self) -> Result<Vec<String>, VecError> {
        let entries = self.store.scan("col:")?;
        Ok(entries
            .iter()
            .filter_map(|(k, _)| parse_schema_key(k).map(str::to_string))
            .collect())
    }

    fn load_schema(&self, name: &str) -> Result<Option<CollectionSchema>, VecError> {
        match self.store.get(&schema_key(name))? {
            Some(data) => Ok(Some(rmp_serde::from_slice(&data)?)),
            None => Ok(None),
        }
    }
}

fn check_schema(
    name: &str,
    stored: &CollectionSchema,
    requested: &CollectionSchema,
) -> Result<(), VecError> {
    if stored.fields != requested.fields {
        return Err(VecError::SchemaMismatch(name.to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for VectorDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDb")
            .field("open_handles", &self.handles.lock().len())
            .finish()
    }
}
