use super::backend::{StagedFile, StagedWriter, StorageBackend, StorageError};
use crate::models::FileInfo;
use crate::naming::{self, StorageName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use uuid::Uuid;

/// How many consecutive milliseconds to try when a storage name is taken.
const MAX_NAME_ATTEMPTS: i64 = 1000;

pub struct LocalStorage {
    storage_path: PathBuf,
    staging_path: PathBuf,
}

impl LocalStorage {
    pub fn new(storage_path: PathBuf) -> Self {
        let staging_path = storage_path.join(naming::STAGING_DIR);
        LocalStorage {
            storage_path,
            staging_path,
        }
    }

    fn item_path(&self, storage_name: &str) -> Result<PathBuf, StorageError> {
        if !naming::is_valid_storage_name(storage_name) {
            return Err(StorageError::InvalidName(storage_name.to_string()));
        }
        Ok(self.storage_path.join(storage_name))
    }

    /// Link the staged file under the first free name. `hard_link` fails
    /// with `AlreadyExists` instead of replacing the target, so two commits
    /// racing for one name can never both win it.
    async fn claim(
        &self,
        staged: &StagedFile,
        name: StorageName,
    ) -> Result<StorageName, StorageError> {
        fs::create_dir_all(&self.storage_path).await?;

        let first = name.timestamp();
        let mut candidate = name;
        while candidate.timestamp() - first < MAX_NAME_ATTEMPTS {
            let target = self.storage_path.join(candidate.to_string());
            match fs::hard_link(&staged.path, &target).await {
                Ok(()) => {
                    tracing::debug!("Stored {} ({} bytes)", candidate, staged.size);
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("Storage name {} is taken, advancing timestamp", candidate);
                    candidate = candidate.with_timestamp(candidate.timestamp() + 1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StorageError::NameExhausted(candidate.display_name()))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn prepare(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.storage_path).await?;

        match fs::remove_dir_all(&self.staging_path).await {
            Ok(()) => tracing::debug!("Cleared staging directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.staging_path).await?;

        Ok(())
    }

    async fn begin_write(&self, limit: u64) -> Result<StagedWriter, StorageError> {
        // Create directory if it doesn't exist
        fs::create_dir_all(&self.staging_path).await?;

        let path = self.staging_path.join(format!("{}.part", Uuid::new_v4()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        Ok(StagedWriter::new(file, path, limit))
    }

    async fn commit(
        &self,
        staged: StagedFile,
        name: StorageName,
    ) -> Result<StorageName, StorageError> {
        let claimed = self.claim(&staged, name).await;
        // The staged path is only a second link once the claim succeeded
        self.discard(staged).await;
        claimed
    }

    async fn discard(&self, staged: StagedFile) {
        if let Err(e) = fs::remove_file(&staged.path).await {
            tracing::warn!(
                "Failed to remove staging file {}: {}",
                staged.path.display(),
                e
            );
        }
    }

    async fn list(&self) -> Result<Vec<FileInfo>, StorageError> {
        // Listing before the first upload yields an empty set
        fs::create_dir_all(&self.storage_path).await?;

        let mut entries = fs::read_dir(&self.storage_path).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let storage_name = match entry.file_name().into_string() {
                Ok(name) if naming::is_valid_storage_name(&name) => name,
                Ok(_) => continue,
                Err(raw) => {
                    tracing::debug!("Skipping non UTF-8 entry {:?}", raw);
                    continue;
                }
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Deleted since read_dir saw it
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            let parsed = naming::parse(&storage_name);
            let upload_time = match parsed.upload_time {
                Some(ts) => ts,
                None => created_millis(&metadata)?,
            };

            files.push(FileInfo {
                name: parsed.display_name,
                path: storage_name,
                size: metadata.len(),
                upload_time,
            });
        }

        files.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(files)
    }

    async fn delete(&self, storage_name: &str) -> Result<(), StorageError> {
        let path = self.item_path(storage_name)?;
        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(storage_name.to_string()),
            _ => StorageError::Io(e),
        })
    }

    async fn locate(&self, storage_name: &str) -> Result<PathBuf, StorageError> {
        let path = self.item_path(storage_name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(StorageError::NotFound(storage_name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Creation time in epoch milliseconds, or modification time on platforms
/// that do not record creation.
fn created_millis(metadata: &Metadata) -> Result<i64, StorageError> {
    let time = metadata.created().or_else(|_| metadata.modified())?;
    Ok(DateTime::<Utc>::from(time).timestamp_millis())
}
