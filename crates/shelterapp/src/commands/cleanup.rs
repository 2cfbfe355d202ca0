//! Folder cleanup: list, verify and delete a resident's folder in a container.
//!
//! The destructive path always goes through [`FolderCleanup::safe_delete`] when
//! called from migration. With `verify` on, the folder name is re-derived,
//! checked against the folder grammar and parsed back, and the delete primitive
//! is never reached unless the parsed badge is the resident's own.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, ShelterError};
use crate::model::{DocumentType, ResidentInfo, StoredObject};
use crate::naming::{self, ParsedFolder};
use crate::store::backend::ObjectStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub success: bool,
    pub deleted_files: Vec<String>,
    pub errors: Vec<String>,
    pub folder_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FolderContents {
    pub files: Vec<StoredObject>,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteAllResult {
    pub incoming: CleanupResult,
    pub departed: CleanupResult,
    pub overall_success: bool,
}

pub type FolderParser = fn(&str) -> Option<ParsedFolder>;

pub struct FolderCleanup<'a, S: ObjectStore + ?Sized> {
    storage: &'a S,
    parser: FolderParser,
}

impl<'a, S: ObjectStore + ?Sized> FolderCleanup<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            parser: naming::parse_resident_folder_name,
        }
    }

    /// Swap the folder-name parser used by the safety check.
    pub fn with_parser(mut self, parser: FolderParser) -> Self {
        self.parser = parser;
        self
    }

    pub async fn list_folder_contents(
        &self,
        container: &str,
        document_type: DocumentType,
        resident: &ResidentInfo,
    ) -> FolderContents {
        let prefix = naming::folder_prefix(resident, document_type);
        match self.storage.list_objects(container, &prefix).await {
            Ok(files) => FolderContents {
                exists: !files.is_empty(),
                files,
            },
            Err(err) => {
                if !err.is_not_found() {
                    warn!(container, prefix = %prefix, error = %err, "could not list folder");
                }
                FolderContents::default()
            }
        }
    }

    /// Delete everything under the resident's folder in one batch.
    /// A folder that does not exist is a successful no-op.
    pub async fn delete_folder(
        &self,
        container: &str,
        document_type: DocumentType,
        resident: &ResidentInfo,
    ) -> CleanupResult {
        let folder_path = naming::folder_prefix(resident, document_type);
        let mut result = CleanupResult {
            folder_path: folder_path.clone(),
            ..Default::default()
        };

        let objects = match self.storage.list_objects(container, &folder_path).await {
            Ok(objects) => objects,
            Err(err) if err.is_not_found() => {
                result.success = true;
                return result;
            }
            Err(err) => {
                result
                    .errors
                    .push(format!("Failed to list {}: {}", folder_path, err));
                return result;
            }
        };

        if objects.is_empty() {
            debug!(container, folder = %folder_path, "folder empty, nothing to delete");
            result.success = true;
            return result;
        }

        let paths: Vec<String> = objects.into_iter().map(|o| o.path).collect();
        match self.storage.delete_objects(container, &paths).await {
            Ok(deleted) => {
                result.success = true;
                result.deleted_files = deleted;
            }
            Err(err) => {
                result
                    .errors
                    .push(format!("Failed to delete {}: {}", folder_path, err));
            }
        }
        result
    }

    /// Delete with an optional badge check on the derived folder name.
    pub async fn safe_delete(
        &self,
        container: &str,
        document_type: DocumentType,
        resident: &ResidentInfo,
        verify: bool,
    ) -> CleanupResult {
        let folder = naming::resident_folder_name(resident);
        let folder_path = naming::folder_prefix(resident, document_type);

        if verify {
            if let Err(err) = self.verify_folder(&folder, resident) {
                warn!(badge = %resident.badge, folder = %folder, error = %err, "refusing to delete folder");
                return CleanupResult {
                    success: false,
                    deleted_files: Vec::new(),
                    errors: vec![err.to_string()],
                    folder_path,
                };
            }
        }

        let contents = self
            .list_folder_contents(container, document_type, resident)
            .await;
        info!(
            container,
            folder = %folder_path,
            files = contents.files.len(),
            "deleting resident folder"
        );
        for file in &contents.files {
            debug!(path = %file.path, "queued for deletion");
        }

        self.delete_folder(container, document_type, resident).await
    }

    fn verify_folder(&self, folder: &str, resident: &ResidentInfo) -> Result<()> {
        if !naming::is_valid_resident_folder_name(folder) {
            return Err(ShelterError::SafetyCheck(format!(
                "folder {} is not a valid resident folder name",
                folder
            )));
        }
        let parsed_badge = (self.parser)(folder).map(|p| p.badge);
        if parsed_badge.as_deref() != Some(resident.badge.as_str()) {
            return Err(ShelterError::SafetyCheck(format!(
                "folder {} does not belong to badge {}",
                folder, resident.badge
            )));
        }
        Ok(())
    }

    /// Clean both containers independently.
    pub async fn delete_all_resident_folders(
        &self,
        incoming_container: &str,
        departed_container: &str,
        resident: &ResidentInfo,
    ) -> DeleteAllResult {
        let (incoming, departed) = tokio::join!(
            self.safe_delete(incoming_container, DocumentType::In, resident, true),
            self.safe_delete(departed_container, DocumentType::Out, resident, true),
        );
        DeleteAllResult {
            overall_success: incoming.success && departed.success,
            incoming,
            departed,
        }
    }
}

/// Emit a cleanup outcome as structured log events.
pub fn log_cleanup_result(result: &CleanupResult, resident: &ResidentInfo) {
    if result.success {
        info!(
            badge = %resident.badge,
            folder = %result.folder_path,
            deleted = result.deleted_files.len(),
            "folder cleanup finished"
        );
    } else {
        for error in &result.errors {
            warn!(badge = %resident.badge, folder = %result.folder_path, error = %error, "folder cleanup failed");
        }
    }
}
