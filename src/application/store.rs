//! Item store collaborator contract.
//!
//! Directory membership is the sole persisted record of moderation state;
//! the implementations behind this trait are the only writers of it.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("garf `{name}` is not pending review")]
    NotFound { name: String },
    #[error("garf name `{name}` is not a plain file name")]
    InvalidName { name: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }
}

#[async_trait]
pub trait GarfStore: Send + Sync {
    /// Names currently approved for serving.
    async fn list_approved(&self) -> Result<Vec<String>, StoreError>;

    /// Names awaiting a moderation decision.
    async fn list_pending(&self) -> Result<Vec<String>, StoreError>;

    /// Move a pending garf into the approved set, overwriting any existing
    /// file of the same name. Fails `NotFound` when the source is absent.
    async fn promote(&self, name: &str) -> Result<(), StoreError>;

    /// Move a pending garf into the rejected set; same contract as
    /// [`promote`](GarfStore::promote).
    async fn reject(&self, name: &str) -> Result<(), StoreError>;

    /// Size in bytes of an approved garf.
    async fn stat_approved(&self, name: &str) -> Result<u64, StoreError>;
}
