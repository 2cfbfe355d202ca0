use crate::error::Result;
use crate::model::{
    DocumentFilter, DocumentRecord, NewDocument, ResidentId, ResidentPatch, ResidentRecord,
    StoredObject,
};
use async_trait::async_trait;
use uuid::Uuid;

/// The `residents` and `out_residents` tables.
#[async_trait]
pub trait ResidentTable: Send + Sync {
    /// All active residents.
    async fn list_residents(&self) -> Result<Vec<ResidentRecord>>;

    /// Insert a resident. The returned record carries the store-assigned id;
    /// whatever id the input had is ignored.
    async fn insert_resident(&self, record: &ResidentRecord) -> Result<ResidentRecord>;

    /// Apply a column patch. Unknown columns are rejected with
    /// `SchemaMismatch` naming the first offending field.
    async fn update_resident(&self, id: ResidentId, payload: &ResidentPatch)
        -> Result<ResidentRecord>;

    async fn delete_resident(&self, id: ResidentId) -> Result<()>;

    /// Move a resident from the active table to `out_residents`.
    async fn move_to_out(&self, id: ResidentId) -> Result<()>;

    async fn list_out_residents(&self) -> Result<Vec<ResidentRecord>>;
}

/// The `documents` table.
#[async_trait]
pub trait DocumentTable: Send + Sync {
    async fn query_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentRecord>>;

    async fn insert_document(&self, document: NewDocument) -> Result<DocumentRecord>;

    async fn delete_document(&self, id: Uuid) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    /// Replace an existing object at the same path instead of failing.
    pub overwrite: bool,
}

/// Blob containers addressed by `(container, path)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object whose path lies under `prefix`, recursively. An empty
    /// prefix lists the whole container. Returned paths are container-relative.
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<StoredObject>>;

    async fn download_object(&self, container: &str, path: &str) -> Result<Vec<u8>>;

    async fn upload_object(
        &self,
        container: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<()>;

    /// Public locator for a stored object. Pure; does not check existence.
    fn resolve_public_locator(&self, container: &str, path: &str) -> String;

    /// Delete a batch of objects. Returns the paths that were removed.
    async fn delete_objects(&self, container: &str, paths: &[String]) -> Result<Vec<String>>;
}

/// Everything the engines need from the outside world.
pub trait Backend: ResidentTable + DocumentTable + ObjectStore {}

impl<T: ResidentTable + DocumentTable + ObjectStore> Backend for T {}

/// True when `path` is `prefix` itself or lies beneath it.
pub(crate) fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_prefix() {
        assert!(under_prefix("IN/1_A/a.pdf", ""));
        assert!(under_prefix("IN/1_A/a.pdf", "IN/1_A"));
        assert!(under_prefix("IN/1_A/a.pdf", "IN/1_A/"));
        assert!(!under_prefix("IN/1_AB/a.pdf", "IN/1_A"));
        assert!(!under_prefix("OUT/1_A/a.pdf", "IN/1_A"));
    }
}
