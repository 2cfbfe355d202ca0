//! Fixtures shared by unit tests.

use crate::api::ShelterApi;
use crate::config::ShelterConfig;
use crate::model::{DocumentRecord, DocumentType, NewDocument, ResidentInfo, ResidentRecord};
use crate::naming;
use crate::store::backend::{Backend, UploadOptions};
use crate::store::fs_backend::FsBackend;
use crate::store::mem_backend::MemBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Default config with no pause before network retries.
pub fn test_config() -> ShelterConfig {
    ShelterConfig::default().without_retry_delay()
}

/// Store an IN document for `resident` the way an upload would: bytes at the
/// canonical path, plus a row pointing at its public locator.
pub async fn seed_in_document<B: Backend + ?Sized>(
    backend: &B,
    config: &ShelterConfig,
    resident: &ResidentRecord,
    file_name: &str,
) -> DocumentRecord {
    let info = ResidentInfo::from(resident);
    let container = config.container(DocumentType::In);
    let path = naming::organized_path(&info, file_name, DocumentType::In);
    let options = UploadOptions {
        content_type: None,
        overwrite: true,
    };
    backend
        .upload_object(container, &path, file_name.as_bytes().to_vec(), &options)
        .await
        .expect("seed upload failed");

    let mut row = NewDocument::new(
        Some(resident.id),
        DocumentType::In,
        file_name,
        backend.resolve_public_locator(container, &path),
    );
    row.file_size = Some(file_name.len() as u64);
    row.description = Some(format!("Scan of {}", file_name));
    row.uploaded_by = Some("intake".to_string());
    row.resident_badge = Some(resident.badge.clone());
    row.resident_name = Some(resident.full_name());
    row.storage_path = Some(path);
    backend
        .insert_document(row)
        .await
        .expect("seed insert failed")
}

/// An API over a fresh in-memory backend.
pub fn mem_api() -> (Arc<MemBackend>, ShelterApi<MemBackend>) {
    let backend = Arc::new(MemBackend::new());
    let api = ShelterApi::new(backend.clone(), test_config());
    (backend, api)
}

pub struct TestEnv {
    // Held so the directory outlives the backend.
    pub _temp_dir: TempDir,
    pub backend: Arc<FsBackend>,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let backend = Arc::new(FsBackend::new(root.clone()));
        Self {
            _temp_dir: temp_dir,
            backend,
            root,
        }
    }

    pub fn api(&self) -> ShelterApi<FsBackend> {
        ShelterApi::new(self.backend.clone(), test_config())
    }
}
