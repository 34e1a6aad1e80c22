pub mod backend;
pub mod local;

pub use backend::{StagedFile, StagedWriter, StorageBackend, StorageError};
pub use local::LocalStorage;

use crate::config::Config;
use std::sync::Arc;

/// Factory function to create the storage backend
pub fn create_storage(config: &Config) -> Arc<dyn StorageBackend> {
    Arc::new(LocalStorage::new(config.storage_path.clone()))
}
