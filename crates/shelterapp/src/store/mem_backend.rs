use super::backend::{under_prefix, DocumentTable, ObjectStore, ResidentTable, UploadOptions};
use crate::error::{Result, ShelterError};
use crate::model::{
    DocumentFilter, DocumentRecord, DocumentType, NewDocument, ResidentId, ResidentPatch,
    ResidentRecord, StoredObject, RESIDENT_COLUMNS, STATUS_OUT,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone)]
struct ObjectEntry {
    bytes: Vec<u8>,
    content_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    residents: Vec<ResidentRecord>,
    out_residents: Vec<ResidentRecord>,
    documents: Vec<DocumentRecord>,
    next_resident_id: ResidentId,
}

#[derive(Default)]
struct Faults {
    offline: bool,
    network_failures: usize,
    failing_downloads: HashSet<String>,
    failing_uploads: HashSet<String>,
    rejected_columns: HashSet<String>,
    fail_document_query: bool,
    offline_document_types: HashSet<DocumentType>,
    document_insert_failures: usize,
    fail_document_delete: bool,
    fail_resident_insert: bool,
}

#[derive(Default)]
struct Calls {
    resident_updates: Vec<(ResidentId, ResidentPatch)>,
    object_deletes: usize,
}

/// In-memory backend for tests.
///
/// All three tables and every container live behind `std::sync::Mutex`, so the
/// backend is `Send + Sync` and can be shared across tasks. Faults are injected
/// through the `set_*`/`fail_*` helpers.
#[derive(Default)]
pub struct MemBackend {
    tables: Mutex<Tables>,
    objects: Mutex<BTreeMap<(String, String), ObjectEntry>>,
    faults: Mutex<Faults>,
    calls: Mutex<Calls>,
    public_base_url: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemBackend {
    pub fn new() -> Self {
        Self {
            public_base_url: "memory://public".to_string(),
            ..Default::default()
        }
    }

    /// Every call fails with a network error while offline.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.faults).offline = offline;
    }

    /// The next `count` calls fail with a network error.
    pub fn fail_next_calls(&self, count: usize) {
        lock(&self.faults).network_failures = count;
    }

    pub fn fail_download(&self, path: impl Into<String>) {
        lock(&self.faults).failing_downloads.insert(path.into());
    }

    pub fn fail_upload(&self, path: impl Into<String>) {
        lock(&self.faults).failing_uploads.insert(path.into());
    }

    /// Treat `column` as absent from the residents schema.
    pub fn reject_column(&self, column: impl Into<String>) {
        lock(&self.faults).rejected_columns.insert(column.into());
    }

    pub fn set_fail_document_query(&self, fail: bool) {
        lock(&self.faults).fail_document_query = fail;
    }

    /// Document queries filtered on `document_type` fail with a network error.
    pub fn set_document_type_offline(&self, document_type: DocumentType) {
        lock(&self.faults)
            .offline_document_types
            .insert(document_type);
    }

    /// The next `count` document inserts fail with a network error.
    pub fn fail_next_document_inserts(&self, count: usize) {
        lock(&self.faults).document_insert_failures = count;
    }

    pub fn set_fail_document_delete(&self, fail: bool) {
        lock(&self.faults).fail_document_delete = fail;
    }

    pub fn set_fail_resident_insert(&self, fail: bool) {
        lock(&self.faults).fail_resident_insert = fail;
    }

    /// Payloads received by `update_resident`, in call order.
    pub fn resident_updates(&self) -> Vec<(ResidentId, ResidentPatch)> {
        lock(&self.calls).resident_updates.clone()
    }

    /// Number of `delete_objects` calls.
    pub fn object_delete_calls(&self) -> usize {
        lock(&self.calls).object_deletes
    }

    /// Seed an object without going through `upload_object`.
    pub fn put_object(&self, container: &str, path: &str, bytes: &[u8]) {
        let now = Utc::now();
        lock(&self.objects).insert(
            (container.to_string(), path.to_string()),
            ObjectEntry {
                bytes: bytes.to_vec(),
                content_type: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn object_paths(&self, container: &str) -> Vec<String> {
        lock(&self.objects)
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn object_bytes(&self, container: &str, path: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .get(&(container.to_string(), path.to_string()))
            .map(|e| e.bytes.clone())
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        lock(&self.tables).documents.clone()
    }

    /// Insert a document row as-is, keeping its id and timestamps.
    pub fn put_document(&self, document: DocumentRecord) {
        lock(&self.tables).documents.push(document);
    }

    fn check_network(&self) -> Result<()> {
        let mut faults = lock(&self.faults);
        if faults.offline {
            return Err(ShelterError::Network("backend offline".to_string()));
        }
        if faults.network_failures > 0 {
            faults.network_failures -= 1;
            return Err(ShelterError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    fn next_id(tables: &mut Tables) -> ResidentId {
        tables.next_resident_id += 1;
        tables.next_resident_id
    }
}

#[async_trait]
impl ResidentTable for MemBackend {
    async fn list_residents(&self) -> Result<Vec<ResidentRecord>> {
        self.check_network()?;
        Ok(lock(&self.tables).residents.clone())
    }

    async fn insert_resident(&self, record: &ResidentRecord) -> Result<ResidentRecord> {
        self.check_network()?;
        if lock(&self.faults).fail_resident_insert {
            return Err(ShelterError::Store("Simulated insert error".to_string()));
        }
        let mut tables = lock(&self.tables);
        let mut stored = record.clone();
        stored.id = Self::next_id(&mut tables);
        stored.extra.clear();
        tables.residents.push(stored.clone());
        Ok(stored)
    }

    async fn update_resident(
        &self,
        id: ResidentId,
        payload: &ResidentPatch,
    ) -> Result<ResidentRecord> {
        self.check_network()?;
        lock(&self.calls)
            .resident_updates
            .push((id, payload.clone()));

        {
            let faults = lock(&self.faults);
            if let Some(field) = payload.keys().find(|k| {
                faults.rejected_columns.contains(*k) || !RESIDENT_COLUMNS.contains(&k.as_str())
            }) {
                return Err(ShelterError::SchemaMismatch {
                    field: field.clone(),
                    message: "column does not exist".to_string(),
                });
            }
        }

        let mut tables = lock(&self.tables);
        let record = tables
            .residents
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ShelterError::NotFound(format!("resident {}", id)))?;
        record.apply_patch(payload)?;
        Ok(record.clone())
    }

    async fn delete_resident(&self, id: ResidentId) -> Result<()> {
        self.check_network()?;
        let mut tables = lock(&self.tables);
        let before = tables.residents.len();
        tables.residents.retain(|r| r.id != id);
        if tables.residents.len() == before {
            return Err(ShelterError::NotFound(format!("resident {}", id)));
        }
        Ok(())
    }

    async fn move_to_out(&self, id: ResidentId) -> Result<()> {
        self.check_network()?;
        let mut tables = lock(&self.tables);
        let idx = tables
            .residents
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ShelterError::NotFound(format!("resident {}", id)))?;
        let mut record = tables.residents.remove(idx);
        record.status = STATUS_OUT.to_string();
        tables.out_residents.push(record);
        Ok(())
    }

    async fn list_out_residents(&self) -> Result<Vec<ResidentRecord>> {
        self.check_network()?;
        Ok(lock(&self.tables).out_residents.clone())
    }
}

#[async_trait]
impl DocumentTable for MemBackend {
    async fn query_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentRecord>> {
        self.check_network()?;
        {
            let faults = lock(&self.faults);
            if faults.fail_document_query {
                return Err(ShelterError::Store("Simulated query error".to_string()));
            }
            if filter
                .document_type
                .is_some_and(|t| faults.offline_document_types.contains(&t))
            {
                return Err(ShelterError::Network("documents unreachable".to_string()));
            }
        }
        Ok(lock(&self.tables)
            .documents
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn insert_document(&self, document: NewDocument) -> Result<DocumentRecord> {
        self.check_network()?;
        {
            let mut faults = lock(&self.faults);
            if faults.document_insert_failures > 0 {
                faults.document_insert_failures -= 1;
                return Err(ShelterError::Network("insert timed out".to_string()));
            }
        }
        let record = document.into_record(Uuid::new_v4(), Utc::now());
        lock(&self.tables).documents.push(record.clone());
        Ok(record)
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.check_network()?;
        if lock(&self.faults).fail_document_delete {
            return Err(ShelterError::Store("Simulated delete error".to_string()));
        }
        let mut tables = lock(&self.tables);
        let before = tables.documents.len();
        tables.documents.retain(|d| d.id != id);
        if tables.documents.len() == before {
            return Err(ShelterError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemBackend {
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<StoredObject>> {
        self.check_network()?;
        Ok(lock(&self.objects)
            .iter()
            .filter(|((c, p), _)| c == container && under_prefix(p, prefix))
            .map(|((_, p), entry)| {
                let mut obj = StoredObject::new(p.clone());
                obj.size = Some(entry.bytes.len() as u64);
                obj.mime_type = entry.content_type.clone();
                obj.created_at = Some(entry.created_at);
                obj.updated_at = Some(entry.updated_at);
                obj
            })
            .collect())
    }

    async fn download_object(&self, container: &str, path: &str) -> Result<Vec<u8>> {
        self.check_network()?;
        if lock(&self.faults).failing_downloads.contains(path) {
            return Err(ShelterError::Store(format!("download of {} refused", path)));
        }
        lock(&self.objects)
            .get(&(container.to_string(), path.to_string()))
            .map(|e| e.bytes.clone())
            .ok_or_else(|| ShelterError::NotFound(format!("{}/{}", container, path)))
    }

    async fn upload_object(
        &self,
        container: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<()> {
        self.check_network()?;
        if lock(&self.faults).failing_uploads.contains(path) {
            return Err(ShelterError::Store(format!("upload of {} refused", path)));
        }
        let mut objects = lock(&self.objects);
        let key = (container.to_string(), path.to_string());
        let now = Utc::now();
        let created_at = match objects.get(&key) {
            Some(_) if !options.overwrite => {
                return Err(ShelterError::Store(format!(
                    "{}/{} already exists",
                    container, path
                )))
            }
            Some(existing) => existing.created_at,
            None => now,
        };
        objects.insert(
            key,
            ObjectEntry {
                bytes,
                content_type: options.content_type.clone(),
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    fn resolve_public_locator(&self, container: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, container, path)
    }

    async fn delete_objects(&self, container: &str, paths: &[String]) -> Result<Vec<String>> {
        self.check_network()?;
        lock(&self.calls).object_deletes += 1;
        let mut objects = lock(&self.objects);
        Ok(paths
            .iter()
            .filter(|p| objects.remove(&(container.to_string(), (*p).clone())).is_some())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentType;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let backend = MemBackend::new();
        let a = backend
            .insert_resident(&ResidentRecord::new("1", "A", "A").with_id(-4))
            .await
            .unwrap();
        let b = backend
            .insert_resident(&ResidentRecord::new("2", "B", "B"))
            .await
            .unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_rejected_column_reports_field() {
        let backend = MemBackend::new();
        let r = backend
            .insert_resident(&ResidentRecord::new("1", "A", "A"))
            .await
            .unwrap();
        backend.reject_column("room_remarks");
        let payload = json!({"room_remarks": "x"}).as_object().unwrap().clone();
        let err = backend.update_resident(r.id, &payload).await.unwrap_err();
        assert!(matches!(err, ShelterError::SchemaMismatch { field, .. } if field == "room_remarks"));
    }

    #[tokio::test]
    async fn test_network_failures_count_down() {
        let backend = MemBackend::new();
        backend.fail_next_calls(1);
        assert!(backend.list_residents().await.unwrap_err().is_network());
        assert!(backend.list_residents().await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_without_overwrite_refuses_existing() {
        let backend = MemBackend::new();
        backend.put_object("c", "IN/1_A/a.pdf", b"x");
        let opts = UploadOptions::default();
        assert!(backend
            .upload_object("c", "IN/1_A/a.pdf", b"y".to_vec(), &opts)
            .await
            .is_err());
        let opts = UploadOptions {
            overwrite: true,
            ..Default::default()
        };
        backend
            .upload_object("c", "IN/1_A/a.pdf", b"y".to_vec(), &opts)
            .await
            .unwrap();
        assert_eq!(backend.object_bytes("c", "IN/1_A/a.pdf").unwrap(), b"y");
    }

    #[tokio::test]
    async fn test_list_objects_by_prefix() {
        let backend = MemBackend::new();
        backend.put_object("c", "IN/1_A/a.pdf", b"1");
        backend.put_object("c", "IN/1_AB/b.pdf", b"22");
        backend.put_object("d", "IN/1_A/c.pdf", b"3");

        let listed = backend.list_objects("c", "IN/1_A").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "IN/1_A/a.pdf");
        assert_eq!(listed[0].size, Some(1));
        assert_eq!(backend.list_objects("c", "").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_move_to_out_marks_status() {
        let backend = MemBackend::new();
        let r = backend
            .insert_resident(&ResidentRecord::new("1", "A", "A"))
            .await
            .unwrap();
        backend.move_to_out(r.id).await.unwrap();
        assert!(backend.list_residents().await.unwrap().is_empty());
        let out = backend.list_out_residents().await.unwrap();
        assert_eq!(out[0].status, STATUS_OUT);
    }

    #[tokio::test]
    async fn test_document_query_filters() {
        let backend = MemBackend::new();
        backend
            .insert_document(NewDocument::new(Some(1), DocumentType::In, "a", "l"))
            .await
            .unwrap();
        backend
            .insert_document(NewDocument::new(Some(1), DocumentType::Out, "a", "l"))
            .await
            .unwrap();
        let found = backend
            .query_documents(&DocumentFilter::for_resident(1, DocumentType::In))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
