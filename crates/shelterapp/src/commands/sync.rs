//! Storage-to-database reconciliation.
//!
//! Sync walks a container, picks out the objects the [`Matcher`] associates
//! with a badge, and inserts a `documents` row for each one that has none.
//! Running it twice in a row inserts nothing the second time.
//!
//! [`cleanup_duplicates`] is the opposite repair: it removes surplus rows that
//! share a (file name, type, resident) key, keeping the newest.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ShelterConfig;
use crate::error::Result;
use crate::matcher::Matcher;
use crate::model::{DocumentFilter, DocumentRecord, DocumentType, NewDocument, ResidentId};
use crate::remote::with_retry;
use crate::store::backend::Backend;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Rows created by this run.
    pub synced: usize,
    /// Objects associated with the badge.
    pub total: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub groups: usize,
    pub removed: Vec<Uuid>,
    pub errors: Vec<String>,
}

pub struct SyncRequest<'a> {
    pub badge: &'a str,
    pub resident_id: ResidentId,
    pub document_type: DocumentType,
    pub resident_name: Option<String>,
}

/// Create missing rows for objects that belong to `request.badge`.
///
/// Listing failures propagate. Failures on single files are collected in the
/// report and never abort the run.
pub async fn sync_documents<B: Backend + ?Sized>(
    backend: &B,
    config: &ShelterConfig,
    matcher: &Matcher,
    request: &SyncRequest<'_>,
) -> Result<SyncReport> {
    let delay = config.retry_delay();
    let container = config.container(request.document_type);

    let objects = with_retry(delay, || backend.list_objects(container, "")).await?;
    let matched: Vec<_> = objects
        .into_iter()
        .filter(|o| matcher.matches(o, request.badge))
        .collect();

    let filter = DocumentFilter::for_resident(request.resident_id, request.document_type);
    let mut known: HashSet<String> = with_retry(delay, || backend.query_documents(&filter))
        .await?
        .into_iter()
        .map(|d| d.file_name)
        .collect();

    let mut report = SyncReport {
        total: matched.len(),
        ..Default::default()
    };

    for object in matched {
        let file_name = object.file_name().to_string();
        if known.contains(&file_name) {
            debug!(file_name = %file_name, "row already present");
            continue;
        }

        let mut row = NewDocument::new(
            Some(request.resident_id),
            request.document_type,
            file_name.clone(),
            backend.resolve_public_locator(container, &object.path),
        );
        row.file_size = object.size;
        row.mime_type = object.mime_type.clone().or_else(|| {
            mime_guess::from_path(&file_name)
                .first()
                .map(|m| m.essence_str().to_string())
        });
        row.uploaded_by = Some(config.sync.uploader_tag.clone());
        row.resident_badge = Some(request.badge.to_string());
        row.resident_name = request.resident_name.clone();
        row.storage_path = Some(object.path.clone());
        row.created_at = object.created_at;
        row.updated_at = object.updated_at;

        match with_retry(delay, || backend.insert_document(row.clone())).await {
            Ok(_) => {
                report.synced += 1;
                known.insert(file_name);
            }
            Err(err) => {
                warn!(badge = request.badge, file_name = %file_name, error = %err, "sync insert failed");
                report
                    .errors
                    .push(format!("Failed to sync {}: {}", file_name, err));
            }
        }
    }

    info!(
        badge = request.badge,
        container,
        weak_suffix = matcher.weak_suffix_enabled(),
        synced = report.synced,
        total = report.total,
        "sync finished"
    );
    Ok(report)
}

type DuplicateKey = (String, DocumentType, Option<ResidentId>);

/// Remove all but the newest row of every (file name, type, resident) group.
pub async fn cleanup_duplicates<B: Backend + ?Sized>(backend: &B) -> Result<DuplicateReport> {
    let rows = backend.query_documents(&DocumentFilter::all()).await?;

    let mut groups: BTreeMap<DuplicateKey, Vec<DocumentRecord>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.file_name.clone(), row.document_type, row.resident_id))
            .or_default()
            .push(row);
    }

    let mut report = DuplicateReport::default();
    for (_, mut rows) in groups.into_iter().filter(|(_, rows)| rows.len() > 1) {
        report.groups += 1;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let keep: DateTime<Utc> = rows[0].created_at;
        debug!(file_name = %rows[0].file_name, kept = %rows[0].id, newest = %keep, "keeping newest row");

        for stale in rows.into_iter().skip(1) {
            match backend.delete_document(stale.id).await {
                Ok(()) => report.removed.push(stale.id),
                Err(err) => {
                    warn!(id = %stale.id, error = %err, "could not delete duplicate row");
                    report
                        .errors
                        .push(format!("Failed to delete {}: {}", stale.id, err));
                }
            }
        }
    }

    info!(groups = report.groups, removed = report.removed.len(), "duplicate cleanup finished");
    Ok(report)
}
