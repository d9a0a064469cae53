#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;

use std::path::Path;
use std::path::PathBuf;

/// A local file being uploaded as a custom source. Ids start with the owning
/// session id so items from several sessions can share one list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadItem {
    pub id: String,
    pub path: PathBuf,
    pub loading: bool,
    pub errored: bool,
    /// Where the server stored the file, once the upload finished.
    pub url: Option<String>,
}

impl UploadItem {
    pub fn new(id: &str, path: &Path) -> UploadItem {
        return UploadItem {
            id: id.to_string(),
            path: path.to_path_buf(),
            loading: true,
            errored: false,
            url: None,
        };
    }

    pub fn file_name(&self) -> String {
        return self
            .path
            .file_name()
            .map(|e| return e.to_string_lossy().to_string())
            .unwrap_or_else(|| return self.path.to_string_lossy().to_string());
    }

    pub fn belongs_to(&self, session_id: &str) -> bool {
        return self.id.starts_with(session_id);
    }

    /// Shallow merge of the fields present in `update`.
    pub fn merge(&mut self, update: &UploadItemUpdate) {
        if let Some(loading) = update.loading {
            self.loading = loading;
        }
        if let Some(errored) = update.errored {
            self.errored = errored;
        }
        if let Some(url) = &update.url {
            self.url = Some(url.to_string());
        }
    }
}

/// Partial `UploadItem`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadItemUpdate {
    pub loading: Option<bool>,
    pub errored: Option<bool>,
    pub url: Option<String>,
}

impl UploadItemUpdate {
    pub fn loading(mut self, loading: bool) -> UploadItemUpdate {
        self.loading = Some(loading);
        return self;
    }

    pub fn errored(mut self, errored: bool) -> UploadItemUpdate {
        self.errored = Some(errored);
        return self;
    }

    pub fn url(mut self, url: &str) -> UploadItemUpdate {
        self.url = Some(url.to_string());
        return self;
    }
}

/// Upload ids are the session id followed by a random suffix.
pub fn upload_item_id(session_id: &str, suffix: &str) -> String {
    return format!("{session_id}-{suffix}");
}
