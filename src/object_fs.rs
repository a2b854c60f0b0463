//! Local-directory object store.
//!
//! Blobs are stored as flat files under a root directory. Writes go to a
//! temporary sibling first and are renamed into place, so readers never see
//! a partially written blob. URLs are `file://` URLs of the absolute path.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use sentiment_harness_core::store::{ObjectNotFound, ObjectStore, StoredObject};

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create storage root: {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve storage root: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            bail!("invalid object name: {:?}", name);
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<StoredObject> {
        let path = self.path_for(name)?;
        let temp_path = self.root.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));

        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("create {}", temp_path.display()))?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("rename into {}", path.display()));
        }
        debug!(path = %path.display(), size = bytes.len(), "blob written");

        Ok(StoredObject {
            name: name.to_string(),
            url: format!("file://{}", path.display()),
        })
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectNotFound(name.to_string()).into())
            }
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("delete {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(&tmp.path().join("blobs")).unwrap();

        let stored = store.put(b"abc".to_vec(), "one.json").await.unwrap();
        assert_eq!(stored.name, "one.json");
        assert!(stored.url.starts_with("file://"));
        assert!(stored.url.ends_with("/one.json"));
        assert_eq!(store.get("one.json").await.unwrap(), b"abc");

        store.put(b"xyz".to_vec(), "one.json").await.unwrap();
        assert_eq!(store.get("one.json").await.unwrap(), b"xyz");

        store.delete("one.json").await.unwrap();
        store.delete("one.json").await.unwrap();
        let err = store.get("one.json").await.unwrap_err();
        assert!(err.downcast_ref::<ObjectNotFound>().is_some());

        let leftovers = std::fs::read_dir(store.root()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path()).unwrap();
        assert!(store.put(b"x".to_vec(), "../escape").await.is_err());
        assert!(store.put(b"x".to_vec(), "a/b").await.is_err());
        assert!(store.get("..").await.is_err());
    }
}
