//! In-memory store implementations for tests and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Object URLs take the
//! form `mem://<name>`; store ids are assigned from a per-store counter
//! starting at 1.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{ResultRecord, SourceFile};

use super::{id_matches, MetadataStore, ObjectNotFound, ObjectStore, StoredObject};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

/// In-memory blob store.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored objects, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.objects)
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<StoredObject> {
        write(&self.objects)?.insert(name.to_string(), bytes);
        Ok(StoredObject {
            name: name.to_string(),
            url: format!("mem://{}", name),
        })
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        read(&self.objects)?
            .get(name)
            .cloned()
            .ok_or_else(|| ObjectNotFound(name.to_string()).into())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        write(&self.objects)?.remove(name);
        Ok(())
    }
}

/// In-memory metadata store.
///
/// Records are kept in insertion order; listings reverse that order so the
/// newest record comes first.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    files: RwLock<Vec<SourceFile>>,
    results: RwLock<Vec<ResultRecord>>,
    next_id: RwLock<i64>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn assign_id(&self) -> Result<i64> {
        let mut next = write(&self.next_id)?;
        *next += 1;
        Ok(*next)
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert_file(&self, file: &SourceFile) -> Result<i64> {
        let store_id = self.assign_id()?;
        let mut stored = file.clone();
        stored.store_id = Some(store_id);
        write(&self.files)?.push(stored);
        Ok(store_id)
    }

    async fn find_file(&self, id: &str) -> Result<Option<SourceFile>> {
        Ok(read(&self.files)?
            .iter()
            .find(|f| id_matches(id, f.store_id, &f.id))
            .cloned())
    }

    async fn list_files(&self, owner: &str) -> Result<Vec<SourceFile>> {
        Ok(read(&self.files)?
            .iter()
            .rev()
            .filter(|f| f.owner == owner)
            .cloned()
            .collect())
    }

    async fn delete_file(&self, id: &str) -> Result<bool> {
        let mut files = write(&self.files)?;
        let before = files.len();
        files.retain(|f| !id_matches(id, f.store_id, &f.id));
        Ok(files.len() != before)
    }

    async fn insert_result(&self, record: &ResultRecord) -> Result<i64> {
        let store_id = self.assign_id()?;
        let mut stored = record.clone();
        stored.store_id = Some(store_id);
        write(&self.results)?.push(stored);
        Ok(store_id)
    }

    async fn find_result(&self, id: &str) -> Result<Option<ResultRecord>> {
        Ok(read(&self.results)?
            .iter()
            .find(|r| id_matches(id, r.store_id, &r.id))
            .cloned())
    }

    async fn list_results(&self, owner: &str) -> Result<Vec<ResultRecord>> {
        Ok(read(&self.results)?
            .iter()
            .rev()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }
}
