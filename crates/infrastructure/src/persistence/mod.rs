//! Persistence adapters for the session stores.

mod file_system;
mod memory;
mod token_store;
mod user_store;

pub use file_system::TokioFileSystem;
pub use memory::{InMemoryTokenStore, InMemoryUserStore};
pub use token_store::FileTokenStore;
pub use user_store::FileUserStore;

use gymlog_application::ports::{FileSystemError, StoreError};

fn to_store_error(e: FileSystemError) -> StoreError {
    StoreError::Io(e.to_string())
}
