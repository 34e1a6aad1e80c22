use crate::models::FileInfo;
use crate::naming::StorageName;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file exceeds maximum allowed size of {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("no free storage name for {0}")]
    NameExhausted(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait defining the interface for storage backends
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create the storage root and clear leftovers of interrupted writes
    async fn prepare(&self) -> Result<(), StorageError>;

    /// Open a hidden staging file that accepts at most `limit` bytes
    async fn begin_write(&self, limit: u64) -> Result<StagedWriter, StorageError>;

    /// Make a finished staging file visible under `name`. If the name is
    /// taken the timestamp is advanced; the name actually used is returned.
    async fn commit(&self, staged: StagedFile, name: StorageName)
        -> Result<StorageName, StorageError>;

    /// Drop a staging file that will not be committed
    async fn discard(&self, staged: StagedFile);

    /// Snapshot of every stored item, newest first
    async fn list(&self) -> Result<Vec<FileInfo>, StorageError>;

    /// Permanently remove one stored item
    async fn delete(&self, storage_name: &str) -> Result<(), StorageError>;

    /// Filesystem path of an existing stored item
    async fn locate(&self, storage_name: &str) -> Result<PathBuf, StorageError>;
}

/// An in-progress write into the staging area.
pub struct StagedWriter {
    file: File,
    path: PathBuf,
    written: u64,
    limit: u64,
}

impl StagedWriter {
    pub(crate) fn new(file: File, path: PathBuf, limit: u64) -> Self {
        StagedWriter {
            file,
            path,
            written: 0,
            limit,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk, failing once the total would pass the limit.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let next = self.written + chunk.len() as u64;
        if next > self.limit {
            return Err(StorageError::TooLarge { limit: self.limit });
        }
        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    /// Flush and sync so the data is complete before it becomes visible.
    /// On failure the staging file is removed.
    pub async fn finish(mut self) -> Result<StagedFile, StorageError> {
        let synced = match self.file.flush().await {
            Ok(()) => self.file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            self.abort().await;
            return Err(e.into());
        }

        Ok(StagedFile {
            path: self.path,
            size: self.written,
        })
    }

    /// Close and remove the staging file.
    pub async fn abort(self) {
        let StagedWriter { file, path, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove staging file {}: {}", path.display(), e);
        }
    }
}

/// A complete file waiting in the staging area.
#[derive(Debug)]
pub struct StagedFile {
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
}

impl StagedFile {
    pub fn size(&self) -> u64 {
        self.size
    }
}
