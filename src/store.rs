// Key/value blob storage behind the leaderboard.
// Reads never fail (missing or unreadable means "nothing stored"); writes replace the whole blob.

use std::collections::HashMap;

use crate::error::Result;

pub trait ScoreStore {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&mut self, key: &str, blob: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-process store for tests and native hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(key: &str, blob: &str) -> Self {
        let mut store = Self::new();
        store.blobs.insert(key.to_string(), blob.to_string());
        store
    }
}

impl ScoreStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.blobs.get(key).cloned()
    }

    fn write(&mut self, key: &str, blob: &str) -> Result<()> {
        self.blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::LocalStorageStore;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::ScoreStore;
    use crate::error::{Result, TrialError};

    /// `window.localStorage`. Missing window or storage access denied reads as empty.
    #[derive(Debug, Default)]
    pub struct LocalStorageStore;

    impl LocalStorageStore {
        fn storage(&self) -> Result<web_sys::Storage> {
            web_sys::window()
                .ok_or_else(|| TrialError::Storage("no window".to_string()))?
                .local_storage()
                .map_err(|e| TrialError::Storage(format!("{:?}", e)))?
                .ok_or_else(|| TrialError::Storage("localStorage unavailable".to_string()))
        }
    }

    impl ScoreStore for LocalStorageStore {
        fn read(&self, key: &str) -> Option<String> {
            self.storage().ok()?.get_item(key).ok().flatten()
        }

        fn write(&mut self, key: &str, blob: &str) -> Result<()> {
            self.storage()?
                .set_item(key, blob)
                .map_err(|e| TrialError::Storage(format!("{:?}", e)))
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.storage()?
                .remove_item(key)
                .map_err(|e| TrialError::Storage(format!("{:?}", e)))
        }
    }
}
