//! Redb-based persistent key-value store implementation.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::{KVError, KVResult, KVStore};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("audiomatch");

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

/// A persistent key-value store backed by a single redb table.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KVResult<Self> {
        let db = Database::create(path).map_err(storage)?;

        // Create the table up front so read transactions never miss it.
        let tx = db.begin_write().map_err(storage)?;
        {
            let _ = tx.open_table(TABLE).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self { db })
    }

    fn write<F>(&self, f: F) -> KVResult<usize>
    where
        F: FnOnce(&mut redb::Table<'_, &'static str, &'static [u8]>) -> KVResult<usize>,
    {
        let tx = self.db.begin_write().map_err(storage)?;
        let n = {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            f(&mut table)?
        };
        tx.commit().map_err(storage)?;
        Ok(n)
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;
        Ok(table
            .get(key)
            .map_err(storage)?
            .map(|value| value.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        self.write(|table| {
            table.insert(key, value).map_err(storage)?;
            Ok(1)
        })
        .map(|_| ())
    }

    fn delete(&self, key: &str) -> KVResult<()> {
        self.write(|table| {
            table.remove(key).map_err(storage)?;
            Ok(1)
        })
        .map(|_| ())
    }

    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        for item in table.range(prefix..).map_err(storage)? {
            let (key, value) = item.map_err(storage)?;
            let key_str = key.value();
            if !key_str.starts_with(prefix) {
                break;
            }
            results.push((key_str.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()> {
        self.write(|table| {
            for (key, value) in entries {
                table.insert(*key, *value).map_err(storage)?;
            }
            Ok(entries.len())
        })
        .map(|_| ())
    }

    fn batch_delete(&self, keys: &[&str]) -> KVResult<()> {
        self.write(|table| {
            for key in keys {
                table.remove(*key).map_err(storage)?;
            }
            Ok(keys.len())
        })
        .map(|_| ())
    }

    fn delete_prefix(&self, prefix: &str) -> KVResult<usize> {
        self.write(|table| {
            let mut doomed = Vec::new();
            for item in table.range(prefix..).map_err(storage)? {
                let (key, _) = item.map_err(storage)?;
                let key_str = key.value();
                if !key_str.starts_with(prefix) {
                    break;
                }
                doomed.push(key_str.to_string());
            }
            for key in &doomed {
                table.remove(key.as_str()).map_err(storage)?;
            }
            Ok(doomed.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redb_basic() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        store.set("key1", b"value1").unwrap();
        assert_eq!(store.get("key1").unwrap(), Some(b"value1".to_vec()));

        store.delete("key1").unwrap();
        assert_eq!(store.get("key1").unwrap(), None);
    }

    #[test]
    fn test_redb_scan_prefix_bounded() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        store.set("prefix:b", b"2").unwrap();
        store.set("prefix:a", b"1").unwrap();
        store.set("prefiy:c", b"3").unwrap();
        store.set("other:c", b"3").unwrap();

        let results = store.scan("prefix:").unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["prefix:a", "prefix:b"]);
    }

    #[test]
    fn test_redb_delete_prefix() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        store
            .batch_set(&[("c:x:1", b"1"), ("c:x:2", b"2"), ("c:y:1", b"3")])
            .unwrap();
        assert_eq!(store.delete_prefix("c:x:").unwrap(), 2);
        assert!(store.scan("c:x:").unwrap().is_empty());
        assert!(store.contains("c:y:1").unwrap());
    }

    #[test]
    fn test_redb_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.set("durable", b"yes").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("durable").unwrap(), Some(b"yes".to_vec()));
    }
}
