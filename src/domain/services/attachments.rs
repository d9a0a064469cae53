#[cfg(test)]
#[path = "attachments_test.rs"]
mod tests;

use super::observable::Observable;
use super::observable::Unsubscriber;
use crate::domain::models::UploadItem;
use crate::domain::models::UploadItemUpdate;

/// Files being uploaded as custom sources. Upload state only lives in
/// memory; once the server has the file it shows up as a regular source.
pub struct AttachmentsContext {
    session_id: String,
    items: Observable<Vec<UploadItem>>,
    session_items: Observable<Vec<UploadItem>>,
}

impl AttachmentsContext {
    pub fn new(session_id: &str) -> AttachmentsContext {
        return AttachmentsContext::with_items(session_id, Observable::new(vec![]));
    }

    /// Shares `items` with other contexts, keeping only this session's
    /// uploads in `session_items`.
    pub fn with_items(session_id: &str, items: Observable<Vec<UploadItem>>) -> AttachmentsContext {
        let owner = session_id.to_string();
        let session_items = items.derived(move |items| {
            return items
                .iter()
                .filter(|e| return e.belongs_to(&owner))
                .cloned()
                .collect::<Vec<UploadItem>>();
        });

        return AttachmentsContext {
            session_id: session_id.to_string(),
            items,
            session_items,
        };
    }

    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn items(&self) -> &Observable<Vec<UploadItem>> {
        return &self.items;
    }

    pub fn session_items(&self) -> &Observable<Vec<UploadItem>> {
        return &self.session_items;
    }

    pub fn subscribe<F>(&self, callback: F) -> Unsubscriber
    where
        F: Fn(&Vec<UploadItem>) + Send + Sync + 'static,
    {
        return self.session_items.subscribe(callback);
    }

    pub fn add_upload_item(&self, item: UploadItem) {
        self.items.update(move |items| {
            items.push(item);
        });
    }

    /// Returns false when no item has `item_id`.
    pub fn update_upload_item(&self, item_id: &str, update: &UploadItemUpdate) -> bool {
        return self.items.update_if(|items| {
            let Some(item) = items.iter_mut().find(|e| return e.id == item_id) else {
                return false;
            };
            item.merge(update);
            return true;
        });
    }

    /// Returns false when no item has `item_id`.
    pub fn remove_upload_item(&self, item_id: &str) -> bool {
        return self.items.update_if(|items| {
            let count = items.len();
            items.retain(|e| return e.id != item_id);
            return items.len() != count;
        });
    }
}
