//! Document migration from the IN container to the OUT container.
//!
//! ```text
//! START → FETCH_IN_DOCS ─(none)──────────────────────────────► DONE
//!                       └─► TRANSFER_EACH ─(any transferred)─► CLEANUP_SOURCE → DONE
//!                                        └─(none)────────────────────────────► DONE
//! ```
//!
//! Each document is transferred on its own: download, upload to the canonical
//! OUT path, insert the OUT row, drop the IN row. A failure in any of the first
//! three steps is recorded and the next document is tried. There is no
//! transaction across steps; a crash part-way leaves state that the sync
//! command can reconcile.
//!
//! Two IN files can sanitize to the same OUT name (`id card.pdf` and
//! `id_card.pdf`). The later one is numbered (`id_card_2.pdf`) so neither
//! object nor row is lost. Numbering follows IN row order, so a rerun maps each
//! document to the same OUT name and finds its row already there.
//!
//! The source folder is only cleaned when at least one document made it, and
//! only through the verified [`FolderCleanup::safe_delete`]. Its outcome is
//! attached to the result but never changes `success`.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use super::cleanup::{log_cleanup_result, FolderCleanup};
use crate::config::ShelterConfig;
use crate::error::Result;
use crate::model::{
    DocumentFilter, DocumentRecord, DocumentType, NewDocument, ResidentId, ResidentInfo,
    ResidentRecord,
};
use crate::naming;
use crate::remote::with_retry;
use crate::store::backend::{Backend, UploadOptions};

pub const CLEANUP_SKIPPED_NOTE: &str = "No documents transferred - cleanup skipped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationMode {
    /// Move: drop the IN rows and clean the source folder.
    Transfer,
    /// Duplicate into OUT and leave the IN side alone.
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferredDocument {
    pub original_path: String,
    pub new_path: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    pub attempted: bool,
    pub success: bool,
    pub deleted_files: Vec<String>,
    pub cleanup_errors: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub transferred_count: usize,
    pub transferred_documents: Vec<TransferredDocument>,
    pub errors: Vec<String>,
    pub folder_cleanup: Option<CleanupOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferStatus {
    pub in_documents: usize,
    pub out_documents: usize,
    pub has_transferred: bool,
}

/// Migrate every IN document of `resident` to the OUT container.
pub async fn run<B: Backend + ?Sized>(
    backend: &B,
    config: &ShelterConfig,
    resident: &ResidentRecord,
    mode: MigrationMode,
) -> MigrationResult {
    let delay = config.retry_delay();
    let mut result = MigrationResult::default();

    let in_filter = DocumentFilter::for_resident(resident.id, DocumentType::In);
    let in_docs = match with_retry(delay, || backend.query_documents(&in_filter)).await {
        Ok(docs) => docs,
        Err(err) => {
            warn!(badge = %resident.badge, error = %err, "could not fetch IN documents");
            result.errors.push(format!("Failed to fetch documents: {}", err));
            return result;
        }
    };

    if in_docs.is_empty() {
        info!(badge = %resident.badge, "no IN documents to migrate");
        result.success = true;
        return result;
    }

    let out_filter = DocumentFilter::for_resident(resident.id, DocumentType::Out);
    let mut existing_out: HashSet<String> =
        match with_retry(delay, || backend.query_documents(&out_filter)).await {
            Ok(docs) => docs.into_iter().map(|d| d.file_name).collect(),
            Err(err) => {
                warn!(badge = %resident.badge, error = %err, "could not fetch OUT documents");
                result
                    .errors
                    .push(format!("Failed to fetch OUT documents: {}", err));
                return result;
            }
        };

    let info = ResidentInfo::from(resident);
    let today = Utc::now().date_naive();
    let mut claimed: HashSet<String> = HashSet::new();

    for doc in &in_docs {
        let file_name =
            unclaimed_name(&naming::sanitize_file_name(&doc.file_name), &mut claimed);
        let target = OutTarget {
            file_name: &file_name,
            has_row: existing_out.contains(&file_name),
        };
        let outcome = transfer_one(backend, config, resident, &info, doc, target, today).await;
        match outcome {
            Ok(transferred) => {
                if mode == MigrationMode::Transfer {
                    if let Err(err) = backend.delete_document(doc.id).await {
                        warn!(file_name = %doc.file_name, error = %err, "could not remove IN row");
                    }
                }
                existing_out.insert(file_name);
                result.transferred_count += 1;
                result.transferred_documents.push(transferred);
            }
            Err(err) => {
                warn!(badge = %resident.badge, file_name = %doc.file_name, error = %err, "transfer failed");
                result
                    .errors
                    .push(format!("Failed to transfer {}: {}", doc.file_name, err));
            }
        }
    }

    if mode == MigrationMode::Transfer {
        result.folder_cleanup = Some(if result.transferred_count > 0 {
            let cleanup = FolderCleanup::new(backend)
                .safe_delete(
                    config.container(DocumentType::In),
                    DocumentType::In,
                    &info,
                    true,
                )
                .await;
            log_cleanup_result(&cleanup, &info);
            CleanupOutcome {
                attempted: true,
                success: cleanup.success,
                deleted_files: cleanup.deleted_files,
                cleanup_errors: cleanup.errors,
                note: None,
            }
        } else {
            CleanupOutcome {
                note: Some(CLEANUP_SKIPPED_NOTE.to_string()),
                ..Default::default()
            }
        });
    }

    result.success = result.transferred_count > 0 || result.errors.is_empty();
    info!(
        badge = %resident.badge,
        transferred = result.transferred_count,
        failed = result.errors.len(),
        "migration finished"
    );
    result
}

/// First of `name`, `name_2`, `name_3`, ... not yet used in this run.
fn unclaimed_name(name: &str, claimed: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 1;
    while claimed.contains(&candidate) {
        n += 1;
        candidate = naming::numbered_file_name(name, n);
    }
    claimed.insert(candidate.clone());
    candidate
}

/// Where one document lands in OUT, and whether its row already exists.
#[derive(Clone, Copy)]
struct OutTarget<'a> {
    file_name: &'a str,
    has_row: bool,
}

async fn transfer_one<B: Backend + ?Sized>(
    backend: &B,
    config: &ShelterConfig,
    resident: &ResidentRecord,
    info: &ResidentInfo,
    doc: &DocumentRecord,
    target: OutTarget<'_>,
    today: NaiveDate,
) -> Result<TransferredDocument> {
    let delay = config.retry_delay();
    let from_container = config.container(DocumentType::In);
    let to_container = config.container(DocumentType::Out);

    let file_name = target.file_name.to_string();
    let new_path = naming::organized_path(info, &file_name, DocumentType::Out);
    let original_path = naming::storage_path_from_locator(&doc.file_path, from_container);

    let bytes = with_retry(delay, || backend.download_object(from_container, &original_path)).await?;
    let size = bytes.len() as u64;

    let mime_type = doc.mime_type.clone().or_else(|| {
        mime_guess::from_path(&file_name)
            .first()
            .map(|m| m.essence_str().to_string())
    });
    let options = UploadOptions {
        content_type: mime_type.clone(),
        overwrite: true,
    };
    with_retry(delay, || {
        backend.upload_object(to_container, &new_path, bytes.clone(), &options)
    })
    .await?;

    // Re-running a migration overwrites the object; the existing row still points at it.
    if !target.has_row {
        let locator = backend.resolve_public_locator(to_container, &new_path);
        let mut row = NewDocument::new(
            Some(resident.id),
            DocumentType::Out,
            file_name.clone(),
            locator,
        );
        row.file_size = Some(size);
        row.mime_type = mime_type;
        row.description = Some(naming::document_description(
            doc.description.as_deref(),
            info,
            today,
        ));
        row.uploaded_by = doc.uploaded_by.clone();
        row.resident_badge = Some(resident.badge.clone());
        row.resident_name = Some(resident.full_name());
        row.storage_path = Some(new_path.clone());
        with_retry(delay, || backend.insert_document(row.clone())).await?;
    }

    info!(badge = %resident.badge, from = %original_path, to = %new_path, "document transferred");
    Ok(TransferredDocument {
        original_path,
        new_path,
        file_name,
    })
}

/// Count IN and OUT rows for a resident.
pub async fn transfer_status<B: Backend + ?Sized>(
    backend: &B,
    resident_id: ResidentId,
) -> Result<TransferStatus> {
    let in_documents = backend
        .query_documents(&DocumentFilter::for_resident(resident_id, DocumentType::In))
        .await?
        .len();
    let out_documents = backend
        .query_documents(&DocumentFilter::for_resident(resident_id, DocumentType::Out))
        .await?
        .len();
    Ok(TransferStatus {
        in_documents,
        out_documents,
        has_transferred: out_documents > 0,
    })
}
