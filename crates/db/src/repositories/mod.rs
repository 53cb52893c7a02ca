use propmatch_core::errors::{ContextStoreError, InventoryError};
use thiserror::Error;

pub mod context;
pub mod fallback;
pub mod inventory;
pub mod memory;

pub use context::SqlContextStore;
pub use fallback::FallbackContextStore;
pub use inventory::SqlInventorySource;
pub use memory::InMemoryContextStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ContextStoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

impl From<RepositoryError> for InventoryError {
    fn from(error: RepositoryError) -> Self {
        Self::Source(error.to_string())
    }
}
