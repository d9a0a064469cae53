use anyhow::Result;
use dashmap::DashMap;

use crate::domain::models::KeyValueStore;

/// Key/value storage that lives as long as the process.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: DashMap<String, String>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        return Ok(self.values.get(key).map(|e| return e.value().to_string()));
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        return Ok(());
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = self
            .values
            .iter()
            .map(|e| return e.key().to_string())
            .collect::<Vec<String>>();

        keys.sort();
        return Ok(keys);
    }
}
