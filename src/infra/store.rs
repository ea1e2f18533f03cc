//! Filesystem-backed item store.
//!
//! Three sibling directories (`new/`, `img/`, `rejects/`) rooted at a
//! configured path; membership in a directory IS the moderation state.
//! Moves are plain renames with overwrite, so re-deciding a name that
//! already exists at the destination replaces it.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::application::store::{GarfStore, StoreError};

const PENDING_DIR: &str = "new";
const APPROVED_DIR: &str = "img";
const REJECTED_DIR: &str = "rejects";

#[derive(Debug)]
pub struct FsGarfStore {
    pending: PathBuf,
    approved: PathBuf,
    rejected: PathBuf,
}

impl FsGarfStore {
    /// Root the store at `root`, creating the three directories if needed.
    pub fn new(root: &Path) -> Result<Self, std::io::Error> {
        let pending = root.join(PENDING_DIR);
        let approved = root.join(APPROVED_DIR);
        let rejected = root.join(REJECTED_DIR);
        std::fs::create_dir_all(&pending)?;
        std::fs::create_dir_all(&approved)?;
        std::fs::create_dir_all(&rejected)?;
        Ok(Self {
            pending,
            approved,
            rejected,
        })
    }

    /// Read an approved garf's bytes, for serving.
    pub async fn read_approved(&self, name: &str) -> Result<Bytes, StoreError> {
        let path = resolve(&self.approved, name)?;
        Ok(Bytes::from(fs::read(path).await?))
    }

    /// Read a pending garf's bytes, for the review surface only.
    pub async fn read_pending(&self, name: &str) -> Result<Bytes, StoreError> {
        let path = resolve(&self.pending, name)?;
        Ok(Bytes::from(fs::read(path).await?))
    }

    /// Write an uploaded payload into the pending set under `name`.
    pub async fn save_pending(&self, name: &str, data: Bytes) -> Result<(), StoreError> {
        let path = resolve(&self.pending, name)?;
        fs::write(path, data).await?;
        Ok(())
    }

    async fn move_pending(&self, name: &str, destination: &Path) -> Result<(), StoreError> {
        let source = resolve(&self.pending, name)?;
        let target = resolve(destination, name)?;
        match fs::rename(&source, &target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::not_found(name)),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[async_trait]
impl GarfStore for FsGarfStore {
    async fn list_approved(&self) -> Result<Vec<String>, StoreError> {
        list_dir(&self.approved).await
    }

    async fn list_pending(&self) -> Result<Vec<String>, StoreError> {
        list_dir(&self.pending).await
    }

    async fn promote(&self, name: &str) -> Result<(), StoreError> {
        self.move_pending(name, &self.approved).await
    }

    async fn reject(&self, name: &str) -> Result<(), StoreError> {
        self.move_pending(name, &self.rejected).await
    }

    async fn stat_approved(&self, name: &str) -> Result<u64, StoreError> {
        let path = resolve(&self.approved, name)?;
        let metadata = fs::metadata(path).await?;
        Ok(metadata.len())
    }
}

/// List plain file names in a directory, sorted so that two listings of an
/// unchanged directory compare equal (read_dir order is unspecified).
async fn list_dir(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Join `name` under `dir`, refusing anything that is not a plain file name.
fn resolve(dir: &Path, name: &str) -> Result<PathBuf, StoreError> {
    let relative = Path::new(name);
    let mut components = relative.components();
    let is_plain = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    if name.is_empty() || !is_plain {
        return Err(StoreError::invalid_name(name));
    }
    Ok(dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_with(pending: &[&str], approved: &[&str]) -> (TempDir, FsGarfStore) {
        let root = TempDir::new().unwrap();
        let store = FsGarfStore::new(root.path()).unwrap();
        for name in pending {
            store
                .save_pending(name, Bytes::from_static(b"payload"))
                .await
                .unwrap();
        }
        for name in approved {
            fs::write(root.path().join(APPROVED_DIR).join(name), b"payload")
                .await
                .unwrap();
        }
        (root, store)
    }

    #[tokio::test]
    async fn listings_are_sorted_and_only_files() {
        let (root, store) = store_with(&[], &["b.png", "a.jpg"]).await;
        fs::create_dir(root.path().join(APPROVED_DIR).join("subdir"))
            .await
            .unwrap();

        assert_eq!(store.list_approved().await.unwrap(), ["a.jpg", "b.png"]);
    }

    #[tokio::test]
    async fn promote_moves_between_directories() {
        let (_root, store) = store_with(&["x.jpg"], &[]).await;

        store.promote("x.jpg").await.unwrap();

        assert!(store.list_pending().await.unwrap().is_empty());
        assert_eq!(store.list_approved().await.unwrap(), ["x.jpg"]);
    }

    #[tokio::test]
    async fn reject_leaves_approved_untouched() {
        let (root, store) = store_with(&["x.jpg"], &["keep.png"]).await;

        store.reject("x.jpg").await.unwrap();

        assert_eq!(store.list_approved().await.unwrap(), ["keep.png"]);
        assert!(
            root.path().join(REJECTED_DIR).join("x.jpg").exists(),
            "rejected file should land in rejects/"
        );
    }

    #[tokio::test]
    async fn promote_overwrites_existing_destination() {
        let (_root, store) = store_with(&["x.jpg"], &["x.jpg"]).await;

        store.promote("x.jpg").await.unwrap();

        assert_eq!(store.list_approved().await.unwrap(), ["x.jpg"]);
    }

    #[tokio::test]
    async fn moving_an_absent_pending_garf_is_not_found() {
        let (_root, store) = store_with(&[], &[]).await;

        assert!(matches!(
            store.promote("ghost.jpg").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            store.reject("ghost.jpg").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn stat_reports_file_size() {
        let (_root, store) = store_with(&[], &["a.jpg"]).await;
        assert_eq!(store.stat_approved("a.jpg").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn traversal_names_are_refused() {
        let (_root, store) = store_with(&[], &[]).await;

        for bad in ["../escape.jpg", "a/b.jpg", "/etc/passwd", ""] {
            assert!(
                matches!(
                    store.read_approved(bad).await.unwrap_err(),
                    StoreError::InvalidName { .. }
                ),
                "expected InvalidName for {bad:?}"
            );
        }
    }
}
