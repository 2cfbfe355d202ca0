//! # API Facade
//!
//! The API layer is a **thin facade** over the roster and the document engines.
//! It is the single entry point for all shelter operations, whatever the UI.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Dispatches** to the roster or the right engine
//! - **Resolves residents** by id, looking at active and departed residents
//! - **Returns structured types** (`Result<CmdResult>`), with leveled messages
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: that belongs in `roster.rs` and `commands/*.rs`
//! - **Terminal I/O**: no stdout, stderr, or formatting
//!
//! ## Check-out and Migration
//!
//! [`ShelterApi::check_out_resident`] moves the resident on the roster and,
//! when the store did the move, migrates their documents right after. A check-out
//! that happened offline does not migrate; the result carries a warning saying
//! so, and the migration can be run later with
//! [`ShelterApi::migrate_resident_documents`].
//!
//! ## Generic Over Backend
//!
//! `ShelterApi<B: Backend>` is generic over the storage backend:
//! - Production: `ShelterApi<FsBackend>`
//! - Testing: `ShelterApi<MemBackend>`

use std::path::Path;
use std::sync::Arc;

use crate::commands::cleanup::FolderCleanup;
use crate::commands::migrate::{self, MigrationMode, MigrationResult};
use crate::commands::sync::{self, SyncRequest};
use crate::commands::{CmdMessage, CmdResult, Report};
use crate::config::ShelterConfig;
use crate::error::{Result, ShelterError};
use crate::matcher::Matcher;
use crate::model::{DocumentType, ResidentId, ResidentInfo, ResidentPatch, ResidentRecord};
use crate::roster::{CheckOutOutcome, RemoteUpdate, Roster};
use crate::store::backend::Backend;
use crate::store::fs_backend::FsBackend;
use crate::views;

pub struct ShelterApi<B: Backend> {
    backend: Arc<B>,
    config: ShelterConfig,
    matcher: Matcher,
    roster: Roster,
}

impl ShelterApi<FsBackend> {
    /// Open the filesystem store rooted at `data_dir`, with config from the
    /// environment and `data_dir/shelter.toml`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let config = ShelterConfig::load(data_dir)?;
        let backend = FsBackend::new(data_dir.to_path_buf())
            .with_public_base_url(&config.storage.public_base_url);
        Ok(Self::new(Arc::new(backend), config))
    }
}

impl<B: Backend> ShelterApi<B> {
    pub fn new(backend: Arc<B>, config: ShelterConfig) -> Self {
        Self {
            matcher: Matcher::new(config.matching.weak_suffix_match),
            roster: Roster::from_config(&config),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &ShelterConfig {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    fn find_resident(&self, id: ResidentId) -> Result<ResidentRecord> {
        self.roster
            .get(id)
            .map(|e| e.record.clone())
            .or_else(|| {
                self.roster
                    .out_residents()
                    .iter()
                    .find(|r| r.id == id)
                    .cloned()
            })
            .ok_or_else(|| ShelterError::NotFound(format!("Resident {}", id)))
    }

    pub async fn load(&mut self) -> Result<CmdResult> {
        self.roster.load(self.backend.as_ref()).await?;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::info(format!(
            "Loaded {} active and {} departed residents",
            self.roster.entries().len(),
            self.roster.out_residents().len()
        )));
        Ok(result)
    }

    pub fn residents(&self) -> Result<CmdResult> {
        Ok(CmdResult::default().with_listed(self.roster.records()))
    }

    pub fn out_residents(&self) -> Result<CmdResult> {
        Ok(CmdResult::default().with_listed(self.roster.out_residents().to_vec()))
    }

    pub fn residents_in_room(&self, room: &str) -> Result<CmdResult> {
        let records = self.roster.records();
        let listed = views::residents_in_room(&records, room)
            .into_iter()
            .cloned()
            .collect();
        Ok(CmdResult::default().with_listed(listed))
    }

    pub fn residents_in_wing(&self, wing: views::Wing) -> Result<CmdResult> {
        let records = self.roster.records();
        let listed = views::residents_in_wing(&records, wing)
            .into_iter()
            .cloned()
            .collect();
        Ok(CmdResult::default().with_listed(listed))
    }

    pub fn kitchen_list(&self) -> Result<CmdResult> {
        let list = views::kitchen_list(&self.roster.records());
        Ok(CmdResult::default().with_report(Report::Kitchen(list)))
    }

    pub fn occupancy(&self) -> Result<CmdResult> {
        let occupancy = views::occupancy(&self.roster.records());
        Ok(CmdResult::default().with_report(Report::Occupancy(occupancy)))
    }

    pub async fn add_resident(&mut self, record: ResidentRecord) -> Result<CmdResult> {
        let entry = self.roster.add(self.backend.as_ref(), record).await?;
        let mut result = CmdResult::default();
        if entry.record.is_provisional() {
            result.add_message(CmdMessage::warning(format!(
                "Resident {} saved locally only",
                entry.record.badge
            )));
        } else {
            result.add_message(CmdMessage::success(format!(
                "Added resident {} ({})",
                entry.record.badge,
                entry.record.full_name()
            )));
        }
        Ok(result.with_affected(vec![entry]))
    }

    pub async fn add_residents(&mut self, records: Vec<ResidentRecord>) -> Result<CmdResult> {
        let outcome = self.roster.add_many(self.backend.as_ref(), records).await;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::info(format!(
            "Added {} residents",
            outcome.added.len()
        )));
        for rejected in &outcome.rejected {
            result.add_message(CmdMessage::error(rejected.clone()));
        }
        Ok(result.with_affected(outcome.added))
    }

    pub async fn update_resident(
        &mut self,
        id: ResidentId,
        patch: &ResidentPatch,
    ) -> Result<CmdResult> {
        let (entry, remote) = self
            .roster
            .update(self.backend.as_ref(), id, patch)
            .await?;
        let mut result = CmdResult::default();
        match remote {
            RemoteUpdate::Applied => {
                result.add_message(CmdMessage::success(format!("Updated resident {}", id)))
            }
            RemoteUpdate::Skipped => result.add_message(CmdMessage::info(
                "No stored fields changed; update kept locally",
            )),
            RemoteUpdate::Repaired { dropped_field } => {
                result.add_message(CmdMessage::warning(format!(
                    "Field '{}' is not stored and was kept locally",
                    dropped_field
                )))
            }
            RemoteUpdate::LocalOnly => result.add_message(CmdMessage::warning(
                "Resident is not saved yet; update kept locally",
            )),
            RemoteUpdate::Failed(err) => result.add_message(CmdMessage::warning(format!(
                "Update kept locally: {}",
                err
            ))),
        }
        Ok(result.with_affected(vec![entry]))
    }

    pub async fn delete_resident(&mut self, id: ResidentId) -> Result<CmdResult> {
        let removal = self.roster.delete(self.backend.as_ref(), id).await?;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!(
            "Deleted resident {}",
            removal.entry.record.badge
        )));
        if let Some(err) = removal.remote_error {
            result.add_message(CmdMessage::warning(format!(
                "Store delete failed: {}",
                err
            )));
        }
        Ok(result.with_affected(vec![removal.entry]))
    }

    pub async fn delete_residents(&mut self, ids: &[ResidentId]) -> Result<CmdResult> {
        let removals = self.roster.delete_many(self.backend.as_ref(), ids).await;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!(
            "Deleted {} residents",
            removals.len()
        )));
        let mut affected = Vec::with_capacity(removals.len());
        for removal in removals {
            if let Some(err) = removal.remote_error {
                result.add_message(CmdMessage::warning(format!(
                    "Store delete of {} failed: {}",
                    removal.entry.record.badge, err
                )));
            }
            affected.push(removal.entry);
        }
        Ok(result.with_affected(affected))
    }

    pub async fn check_out_resident(&mut self, id: ResidentId) -> Result<CmdResult> {
        let (entry, outcome) = self.roster.check_out(self.backend.as_ref(), id).await?;
        let mut result = CmdResult::default();
        match outcome {
            CheckOutOutcome::Remote => {
                result.add_message(CmdMessage::success(format!(
                    "Checked out resident {}",
                    entry.record.badge
                )));
                let migration = migrate::run(
                    self.backend.as_ref(),
                    &self.config,
                    &entry.record,
                    MigrationMode::Transfer,
                )
                .await;
                add_migration_messages(&mut result, &migration);
                result = result.with_report(Report::Migration(migration));
            }
            CheckOutOutcome::Offline => {
                result.add_message(CmdMessage::warning(format!(
                    "Store unreachable: resident {} checked out locally, documents were not migrated",
                    entry.record.badge
                )));
            }
        }
        Ok(result.with_affected(vec![entry]))
    }

    /// Empty the active roster locally. Undoable.
    pub fn clear_residents(&mut self) -> Result<CmdResult> {
        let count = self.roster.entries().len();
        self.roster.clear();
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!(
            "Cleared {} residents from the roster",
            count
        )));
        Ok(result)
    }

    pub fn undo(&mut self) -> Result<CmdResult> {
        let mut result = CmdResult::default();
        match self.roster.undo_step() {
            Some(returned) => {
                result.add_message(CmdMessage::success("Undone"));
                if !returned.is_empty() {
                    result.add_message(CmdMessage::warning(format!(
                        "Restored {} checked-out resident(s) locally; the store was not changed",
                        returned.len()
                    )));
                }
            }
            None => result.add_message(CmdMessage::info("Nothing to undo")),
        }
        Ok(result)
    }

    pub fn redo(&mut self) -> Result<CmdResult> {
        let mut result = CmdResult::default();
        if self.roster.redo_step().is_some() {
            result.add_message(CmdMessage::success("Redone"));
        } else {
            result.add_message(CmdMessage::info("Nothing to redo"));
        }
        Ok(result)
    }

    async fn run_migration(&self, id: ResidentId, mode: MigrationMode) -> Result<CmdResult> {
        let resident = self.find_resident(id)?;
        let migration = migrate::run(self.backend.as_ref(), &self.config, &resident, mode).await;
        let mut result = CmdResult::default();
        add_migration_messages(&mut result, &migration);
        Ok(result.with_report(Report::Migration(migration)))
    }

    pub async fn migrate_resident_documents(&self, id: ResidentId) -> Result<CmdResult> {
        self.run_migration(id, MigrationMode::Transfer).await
    }

    pub async fn copy_resident_documents(&self, id: ResidentId) -> Result<CmdResult> {
        self.run_migration(id, MigrationMode::Copy).await
    }

    pub async fn sync_resident_documents(
        &self,
        badge: &str,
        resident_id: ResidentId,
        document_type: DocumentType,
    ) -> Result<CmdResult> {
        let request = SyncRequest {
            badge,
            resident_id,
            document_type,
            resident_name: self.find_resident(resident_id).ok().map(|r| r.full_name()),
        };
        let report = sync::sync_documents(
            self.backend.as_ref(),
            &self.config,
            &self.matcher,
            &request,
        )
        .await?;

        let mut result = CmdResult::default();
        result.add_message(CmdMessage::info(format!(
            "Synced {} of {} stored files for badge {}",
            report.synced, report.total, badge
        )));
        for err in &report.errors {
            result.add_message(CmdMessage::error(err.clone()));
        }
        Ok(result.with_report(Report::Sync(report)))
    }

    /// Delete a resident's IN and OUT folders.
    pub async fn delete_resident_folders(&self, id: ResidentId) -> Result<CmdResult> {
        let resident = self.find_resident(id)?;
        let info = ResidentInfo::from(&resident);
        let outcome = FolderCleanup::new(self.backend.as_ref())
            .delete_all_resident_folders(
                self.config.container(DocumentType::In),
                self.config.container(DocumentType::Out),
                &info,
            )
            .await;

        let mut result = CmdResult::default();
        let deleted = outcome.incoming.deleted_files.len() + outcome.departed.deleted_files.len();
        if outcome.overall_success {
            result.add_message(CmdMessage::success(format!(
                "Deleted {} files for resident {}",
                deleted, resident.badge
            )));
        }
        for err in outcome
            .incoming
            .errors
            .iter()
            .chain(outcome.departed.errors.iter())
        {
            result.add_message(CmdMessage::error(err.clone()));
        }
        Ok(result.with_report(Report::Cleanup(outcome)))
    }

    pub async fn transfer_status(&self, id: ResidentId) -> Result<CmdResult> {
        let status = migrate::transfer_status(self.backend.as_ref(), id).await?;
        Ok(CmdResult::default().with_report(Report::TransferStatus(status)))
    }

    pub async fn cleanup_duplicates(&self) -> Result<CmdResult> {
        let report = sync::cleanup_duplicates(self.backend.as_ref()).await?;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::info(format!(
            "Removed {} duplicate rows in {} groups",
            report.removed.len(),
            report.groups
        )));
        for err in &report.errors {
            result.add_message(CmdMessage::error(err.clone()));
        }
        Ok(result.with_report(Report::Duplicates(report)))
    }
}

fn add_migration_messages(result: &mut CmdResult, migration: &MigrationResult) {
    if migration.transferred_count > 0 {
        result.add_message(CmdMessage::success(format!(
            "Transferred {} documents",
            migration.transferred_count
        )));
    } else if migration.errors.is_empty() {
        result.add_message(CmdMessage::info("No documents to transfer"));
    }
    for err in &migration.errors {
        result.add_message(CmdMessage::error(err.clone()));
    }
    if let Some(cleanup) = &migration.folder_cleanup {
        if let Some(note) = &cleanup.note {
            result.add_message(CmdMessage::info(note.clone()));
        }
        for err in &cleanup.cleanup_errors {
            result.add_message(CmdMessage::warning(format!("Cleanup: {}", err)));
        }
    }
}
