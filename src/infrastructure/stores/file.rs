#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::fs;
use std::io::ErrorKind;
use std::path;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::KeyValueStore;

/// Key/value storage with one JSON file per key.
pub struct FileStore {
    pub dir: path::PathBuf,
}

impl Default for FileStore {
    fn default() -> FileStore {
        let dir = path::PathBuf::from(Config::get(ConfigKey::StorageDir));
        return FileStore::new(dir);
    }
}

impl FileStore {
    pub fn new(dir: path::PathBuf) -> FileStore {
        return FileStore { dir };
    }

    fn get_file_path(&self, key: &str) -> Result<path::PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|e| return e.is_ascii_alphanumeric() || e == '_' || e == '-');
        if !valid {
            bail!(format!("Invalid storage key {key}"));
        }

        return Ok(self.dir.join(format!("{key}.json")));
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let file_path = self.get_file_path(key)?;
        match fs::read_to_string(file_path) {
            Ok(payload) => return Ok(Some(payload)),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let file_path = self.get_file_path(key)?;
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        // Readers never observe a partially written value.
        let tmp_path = file_path.with_extension("json.tmp");
        fs::write(&tmp_path, value)?;
        fs::rename(tmp_path, file_path)?;

        return Ok(());
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut keys = fs::read_dir(&self.dir)?
            .filter_map(|entry| {
                let file_name = entry.ok()?.file_name().to_string_lossy().to_string();
                return file_name.strip_suffix(".json").map(|e| return e.to_string());
            })
            .collect::<Vec<String>>();

        keys.sort();
        return Ok(keys);
    }
}
