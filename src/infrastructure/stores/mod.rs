pub mod file;
pub mod memory;
pub mod memory_kv;
pub mod polling;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;

use crate::domain::models::KeyValueStoreBox;
use crate::domain::models::RemoteStoreBox;
use crate::domain::models::StoreName;

pub struct StoreManager {}

impl StoreManager {
    /// The remote store sessions and sources are synchronized from.
    pub fn get(name: StoreName) -> Result<RemoteStoreBox> {
        if name == StoreName::Api {
            return Ok(Arc::<polling::PollingStore>::default());
        }

        if name == StoreName::Memory {
            return Ok(Arc::<memory::MemoryStore>::default());
        }

        bail!(format!("No store implemented for {name}"))
    }

    /// Where local sessions are persisted. The in-memory remote store is
    /// paired with in-memory storage so nothing outlives the process.
    pub fn key_value(name: StoreName) -> Result<KeyValueStoreBox> {
        if name == StoreName::Api {
            return Ok(Arc::<file::FileStore>::default());
        }

        if name == StoreName::Memory {
            return Ok(Arc::<memory_kv::MemoryKeyValueStore>::default());
        }

        bail!(format!("No key/value storage implemented for {name}"))
    }
}
