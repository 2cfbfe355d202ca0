use super::backend::{under_prefix, DocumentTable, ObjectStore, ResidentTable, UploadOptions};
use crate::error::{Result, ShelterError};
use crate::model::{
    schema_payload, DocumentFilter, DocumentRecord, NewDocument, ResidentId, ResidentPatch,
    ResidentRecord, StoredObject, RESIDENT_COLUMNS, STATUS_OUT,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

const RESIDENTS: &str = "residents.json";
const OUT_RESIDENTS: &str = "out_residents.json";
const DOCUMENTS: &str = "documents.json";

/// Filesystem backend.
///
/// ```text
/// <root>/
/// ├── tables/
/// │   ├── residents.json
/// │   ├── out_residents.json
/// │   └── documents.json
/// └── containers/
///     └── <container>/IN/<badge>_<name>/<file>
/// ```
///
/// Table writes are atomic (tmp file + rename) and serialized through one
/// async lock, so concurrent migrations never interleave a read-modify-write.
pub struct FsBackend {
    root: PathBuf,
    public_base_url: String,
    table_lock: Mutex<()>,
}

impl FsBackend {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            public_base_url: "file://shelter/public".to_string(),
            table_lock: Mutex::new(()),
        }
    }

    pub fn with_public_base_url(mut self, url: &str) -> Self {
        self.public_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join("tables").join(name)
    }

    fn container_root(&self, container: &str) -> Result<PathBuf> {
        Ok(self.root.join("containers").join(checked_relative(container)?))
    }

    fn object_path(&self, container: &str, path: &str) -> Result<PathBuf> {
        Ok(self.container_root(container)?.join(checked_relative(path)?))
    }

    async fn load_table<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.table_path(name);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ShelterError::Io(e)),
        }
    }

    async fn save_table<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<()> {
        let path = self.table_path(name);
        let dir = self.root.join("tables");
        fs::create_dir_all(&dir).await?;

        let content = serde_json::to_string_pretty(rows)?;
        let tmp = dir.join(format!(".{}-{}.tmp", name, Uuid::new_v4()));
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Reject absolute paths and `..` so callers cannot escape a container.
fn checked_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path.trim_start_matches('/'));
    if candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ShelterError::Store(format!("Invalid object path: {}", path)));
    }
    Ok(candidate.to_path_buf())
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[async_trait]
impl ResidentTable for FsBackend {
    async fn list_residents(&self) -> Result<Vec<ResidentRecord>> {
        self.load_table(RESIDENTS).await
    }

    async fn insert_resident(&self, record: &ResidentRecord) -> Result<ResidentRecord> {
        let _guard = self.table_lock.lock().await;
        let mut residents: Vec<ResidentRecord> = self.load_table(RESIDENTS).await?;
        let out: Vec<ResidentRecord> = self.load_table(OUT_RESIDENTS).await?;

        let next_id = residents
            .iter()
            .chain(out.iter())
            .map(|r| r.id)
            .max()
            .unwrap_or(0)
            .max(0)
            + 1;

        let mut stored = record.clone();
        stored.id = next_id;
        stored.extra.clear();
        residents.push(stored.clone());
        self.save_table(RESIDENTS, &residents).await?;
        Ok(stored)
    }

    async fn update_resident(
        &self,
        id: ResidentId,
        payload: &ResidentPatch,
    ) -> Result<ResidentRecord> {
        if let Some(field) = payload
            .keys()
            .find(|k| !RESIDENT_COLUMNS.contains(&k.as_str()))
        {
            return Err(ShelterError::SchemaMismatch {
                field: field.clone(),
                message: "column does not exist".to_string(),
            });
        }

        let _guard = self.table_lock.lock().await;
        let mut residents: Vec<ResidentRecord> = self.load_table(RESIDENTS).await?;
        let record = residents
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ShelterError::NotFound(format!("resident {}", id)))?;
        record.apply_patch(&schema_payload(payload))?;
        let updated = record.clone();
        self.save_table(RESIDENTS, &residents).await?;
        Ok(updated)
    }

    async fn delete_resident(&self, id: ResidentId) -> Result<()> {
        let _guard = self.table_lock.lock().await;
        let mut residents: Vec<ResidentRecord> = self.load_table(RESIDENTS).await?;
        let before = residents.len();
        residents.retain(|r| r.id != id);
        if residents.len() == before {
            return Err(ShelterError::NotFound(format!("resident {}", id)));
        }
        self.save_table(RESIDENTS, &residents).await
    }

    async fn move_to_out(&self, id: ResidentId) -> Result<()> {
        let _guard = self.table_lock.lock().await;
        let mut residents: Vec<ResidentRecord> = self.load_table(RESIDENTS).await?;
        let mut out: Vec<ResidentRecord> = self.load_table(OUT_RESIDENTS).await?;

        let idx = residents
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ShelterError::NotFound(format!("resident {}", id)))?;
        let mut record = residents.remove(idx);
        record.status = STATUS_OUT.to_string();
        out.push(record);

        // Write the destination first: a crash in between leaves the resident
        // in both tables rather than in neither.
        self.save_table(OUT_RESIDENTS, &out).await?;
        self.save_table(RESIDENTS, &residents).await
    }

    async fn list_out_residents(&self) -> Result<Vec<ResidentRecord>> {
        self.load_table(OUT_RESIDENTS).await
    }
}

#[async_trait]
impl DocumentTable for FsBackend {
    async fn query_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentRecord>> {
        let docs: Vec<DocumentRecord> = self.load_table(DOCUMENTS).await?;
        Ok(docs.into_iter().filter(|d| filter.matches(d)).collect())
    }

    async fn insert_document(&self, document: NewDocument) -> Result<DocumentRecord> {
        let _guard = self.table_lock.lock().await;
        let mut docs: Vec<DocumentRecord> = self.load_table(DOCUMENTS).await?;
        let record = document.into_record(Uuid::new_v4(), Utc::now());
        docs.push(record.clone());
        self.save_table(DOCUMENTS, &docs).await?;
        Ok(record)
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        let _guard = self.table_lock.lock().await;
        let mut docs: Vec<DocumentRecord> = self.load_table(DOCUMENTS).await?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(ShelterError::NotFound(format!("document {}", id)));
        }
        self.save_table(DOCUMENTS, &docs).await
    }
}

#[async_trait]
impl ObjectStore for FsBackend {
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<StoredObject>> {
        let base = self.container_root(container)?;
        let mut found = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ShelterError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let Some(key) = relative_key(&base, &path) else {
                    continue;
                };
                if !under_prefix(&key, prefix) {
                    continue;
                }
                let mut obj = StoredObject::new(key);
                obj.size = Some(meta.len());
                obj.mime_type = mime_guess::from_path(&path)
                    .first()
                    .map(|m| m.essence_str().to_string());
                obj.created_at = meta.created().ok().map(DateTime::<Utc>::from);
                obj.updated_at = meta.modified().ok().map(DateTime::<Utc>::from);
                found.push(obj);
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    async fn download_object(&self, container: &str, path: &str) -> Result<Vec<u8>> {
        let target = self.object_path(container, path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ShelterError::NotFound(
                format!("{}/{}", container, path),
            )),
            Err(e) => Err(ShelterError::Io(e)),
        }
    }

    async fn upload_object(
        &self,
        container: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<()> {
        let target = self.object_path(container, path)?;
        if !options.overwrite && fs::try_exists(&target).await? {
            return Err(ShelterError::Store(format!(
                "{}/{} already exists",
                container, path
            )));
        }
        let dir = target
            .parent()
            .ok_or_else(|| ShelterError::Store(format!("Invalid object path: {}", path)))?;
        fs::create_dir_all(dir).await?;

        let tmp = dir.join(format!(".upload-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &target).await?;
        Ok(())
    }

    fn resolve_public_locator(&self, container: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, container, path)
    }

    async fn delete_objects(&self, container: &str, paths: &[String]) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for path in paths {
            let target = self.object_path(container, path)?;
            match fs::remove_file(&target).await {
                Ok(()) => deleted.push(path.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ShelterError::Io(e)),
            }
        }
        Ok(deleted)
    }
}
