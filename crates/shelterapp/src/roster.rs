//! # Resident Roster
//!
//! The roster is the client's working copy of the active residents. Every edit
//! lands locally first and is then pushed to the backing store. A failed push
//! never rolls the local edit back; the entry is marked [`SyncState::Pending`]
//! instead.
//!
//! ## Provisional Ids
//!
//! A resident added locally gets a negative id until the store answers with its
//! own. Provisional entries are never sent as updates or deletes.
//!
//! ## History
//!
//! Removals (delete, bulk delete, check-out, clear) snapshot both the active and
//! the departed collections onto the undo stack and clear redo. Adds and
//! updates are not undoable but still clear redo, so a redo never resurrects a
//! state older than the latest edit. Undo and redo only swap local snapshots;
//! they do not replay anything against the store.
//!
//! ## Check-out
//!
//! With the store reachable, the resident is moved to `out_residents` remotely
//! and the local OUT list is reloaded. When the store is unreachable after one
//! retry, the move happens locally only and the caller is told so through
//! [`CheckOutOutcome::Offline`]. Any other store error leaves the roster as it was.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ShelterConfig;
use crate::error::{Result, ShelterError};
use crate::history::History;
use crate::model::{schema_payload, ResidentId, ResidentPatch, ResidentRecord, STATUS_OUT};
use crate::remote::{update_with_repair, with_retry};
use crate::store::backend::ResidentTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Synced,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub record: ResidentRecord,
    pub sync: SyncState,
}

impl RosterEntry {
    fn pending(record: ResidentRecord) -> Self {
        Self {
            record,
            sync: SyncState::Pending,
        }
    }

    fn synced(record: ResidentRecord) -> Self {
        Self {
            record,
            sync: SyncState::Synced,
        }
    }

    pub fn id(&self) -> ResidentId {
        self.record.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutOutcome {
    /// The store moved the resident.
    Remote,
    /// The store was unreachable; the move is local only.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUpdate {
    Applied,
    /// Nothing in the patch is a store column.
    Skipped,
    /// The store rejected a column; the rest was applied.
    Repaired { dropped_field: String },
    /// Not sent: the entry has no store id yet.
    LocalOnly,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub entry: RosterEntry,
    pub remote_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddManyOutcome {
    pub added: Vec<RosterEntry>,
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    active: Vec<RosterEntry>,
    out: Vec<ResidentRecord>,
}

pub struct Roster {
    active: Vec<RosterEntry>,
    out: Vec<ResidentRecord>,
    history: History<Snapshot>,
    next_provisional: ResidentId,
    retry_delay: Duration,
}

impl Roster {
    pub fn new(undo_limit: usize, retry_delay: Duration) -> Self {
        Self {
            active: Vec::new(),
            out: Vec::new(),
            history: History::new(undo_limit),
            next_provisional: 0,
            retry_delay,
        }
    }

    pub fn from_config(config: &ShelterConfig) -> Self {
        Self::new(config.roster.undo_limit, config.retry_delay())
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.active
    }

    pub fn records(&self) -> Vec<ResidentRecord> {
        self.active.iter().map(|e| e.record.clone()).collect()
    }

    pub fn out_residents(&self) -> &[ResidentRecord] {
        &self.out
    }

    pub fn get(&self, id: ResidentId) -> Option<&RosterEntry> {
        self.active.iter().find(|e| e.id() == id)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn provisional_id(&mut self) -> ResidentId {
        self.next_provisional -= 1;
        self.next_provisional
    }

    fn position(&self, id: ResidentId) -> Result<usize> {
        self.active
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| ShelterError::NotFound(format!("Resident {} is not on the roster", id)))
    }

    fn ensure_badge_free(&self, badge: &str, except: Option<ResidentId>) -> Result<()> {
        let taken = self
            .active
            .iter()
            .any(|e| e.record.badge == badge && Some(e.id()) != except);
        if taken {
            return Err(ShelterError::Api(format!(
                "Badge {} is already assigned to an active resident",
                badge
            )));
        }
        Ok(())
    }

    fn snapshot(&mut self) {
        self.history.record(Snapshot {
            active: self.active.clone(),
            out: self.out.clone(),
        });
        debug!(undo_depth = self.history.undo_depth(), "roster snapshot recorded");
    }

    fn take_state(&mut self) -> Snapshot {
        Snapshot {
            active: std::mem::take(&mut self.active),
            out: std::mem::take(&mut self.out),
        }
    }

    fn restore(&mut self, state: Snapshot) -> Vec<ResidentId> {
        debug!(
            undo_depth = self.history.undo_depth(),
            redo_depth = self.history.redo_depth(),
            "roster history step"
        );
        let before: Vec<ResidentId> = self.out.iter().map(|r| r.id).collect();
        self.active = state.active;
        self.out = state.out;
        before
            .into_iter()
            .filter(|id| *id > 0 && self.active.iter().any(|e| e.id() == *id))
            .collect()
    }

    /// Replace both collections from the store and forget history.
    pub async fn load<R: ResidentTable + ?Sized>(&mut self, table: &R) -> Result<()> {
        let active = with_retry(self.retry_delay, || table.list_residents()).await?;
        let out = with_retry(self.retry_delay, || table.list_out_residents()).await?;
        info!(active = active.len(), out = out.len(), "roster loaded");
        self.active = active.into_iter().map(RosterEntry::synced).collect();
        self.out = out;
        self.history.clear();
        Ok(())
    }

    /// Add a resident locally, then persist it. Fails only on a badge collision.
    pub async fn add<R: ResidentTable + ?Sized>(
        &mut self,
        table: &R,
        mut record: ResidentRecord,
    ) -> Result<RosterEntry> {
        self.ensure_badge_free(&record.badge, None)?;
        self.history.clear_redo();

        let provisional = self.provisional_id();
        record.id = provisional;
        self.active.push(RosterEntry::pending(record.clone()));

        match with_retry(self.retry_delay, || table.insert_resident(&record)).await {
            Ok(stored) => {
                info!(badge = %record.badge, id = stored.id, "resident saved");
                let idx = self.position(provisional)?;
                let entry = &mut self.active[idx];
                entry.record.id = stored.id;
                entry.sync = SyncState::Synced;
                Ok(entry.clone())
            }
            Err(err) => {
                warn!(badge = %record.badge, error = %err, "resident kept locally only");
                Ok(RosterEntry::pending(record))
            }
        }
    }

    pub async fn add_many<R: ResidentTable + ?Sized>(
        &mut self,
        table: &R,
        records: Vec<ResidentRecord>,
    ) -> AddManyOutcome {
        let mut outcome = AddManyOutcome::default();
        for record in records {
            let badge = record.badge.clone();
            match self.add(table, record).await {
                Ok(entry) => outcome.added.push(entry),
                Err(err) => outcome.rejected.push(format!("{}: {}", badge, err)),
            }
        }
        outcome
    }

    /// Merge `patch` locally, then push the recognized columns.
    pub async fn update<R: ResidentTable + ?Sized>(
        &mut self,
        table: &R,
        id: ResidentId,
        patch: &ResidentPatch,
    ) -> Result<(RosterEntry, RemoteUpdate)> {
        let idx = self.position(id)?;
        let mut record = self.active[idx].record.clone();
        record.apply_patch(patch)?;
        self.ensure_badge_free(&record.badge, Some(id))?;
        self.history.clear_redo();
        self.active[idx].record = record;

        let payload = schema_payload(patch);
        let remote = if payload.is_empty() {
            info!(resident_id = id, "no store columns in update, skipping remote call");
            RemoteUpdate::Skipped
        } else if id < 0 {
            RemoteUpdate::LocalOnly
        } else {
            match update_with_repair(table, id, payload, self.retry_delay).await {
                Ok(outcome) => match outcome.dropped_field {
                    Some(dropped_field) => RemoteUpdate::Repaired { dropped_field },
                    None => RemoteUpdate::Applied,
                },
                Err(err) => {
                    warn!(resident_id = id, error = %err, "update kept locally only");
                    RemoteUpdate::Failed(err.to_string())
                }
            }
        };

        let entry = &mut self.active[idx];
        entry.sync = match remote {
            RemoteUpdate::Failed(_) | RemoteUpdate::LocalOnly => SyncState::Pending,
            _ => entry.sync,
        };
        Ok((entry.clone(), remote))
    }

    async fn delete_remote<R: ResidentTable + ?Sized>(
        &self,
        table: &R,
        id: ResidentId,
    ) -> Option<String> {
        if id < 0 {
            return None;
        }
        match with_retry(self.retry_delay, || table.delete_resident(id)).await {
            Ok(()) => None,
            Err(err) => {
                warn!(resident_id = id, error = %err, "remote delete failed");
                Some(err.to_string())
            }
        }
    }

    pub async fn delete<R: ResidentTable + ?Sized>(
        &mut self,
        table: &R,
        id: ResidentId,
    ) -> Result<Removal> {
        let idx = self.position(id)?;
        self.snapshot();
        let entry = self.active.remove(idx);
        let remote_error = self.delete_remote(table, id).await;
        Ok(Removal {
            entry,
            remote_error,
        })
    }

    /// Remove every listed resident under one undo snapshot. Unknown ids are ignored.
    pub async fn delete_many<R: ResidentTable + ?Sized>(
        &mut self,
        table: &R,
        ids: &[ResidentId],
    ) -> Vec<Removal> {
        if !self.active.iter().any(|e| ids.contains(&e.id())) {
            return Vec::new();
        }
        self.snapshot();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|e| ids.contains(&e.id()));
        self.active = kept;

        let mut removals = Vec::with_capacity(removed.len());
        for entry in removed {
            let remote_error = self.delete_remote(table, entry.id()).await;
            removals.push(Removal {
                entry,
                remote_error,
            });
        }
        removals
    }

    /// Move a resident out of the active roster.
    pub async fn check_out<R: ResidentTable + ?Sized>(
        &mut self,
        table: &R,
        id: ResidentId,
    ) -> Result<(RosterEntry, CheckOutOutcome)> {
        let idx = self.position(id)?;

        let remote = if id < 0 {
            Err(ShelterError::Network("resident was never saved".to_string()))
        } else {
            with_retry(self.retry_delay, || table.move_to_out(id)).await
        };

        match remote {
            Ok(()) => {
                self.snapshot();
                let entry = self.active.remove(idx);
                match with_retry(self.retry_delay, || table.list_out_residents()).await {
                    Ok(out) => self.out = out,
                    Err(err) => {
                        warn!(error = %err, "could not reload OUT residents");
                        let mut record = entry.record.clone();
                        record.status = STATUS_OUT.to_string();
                        self.out.push(record);
                    }
                }
                info!(badge = %entry.record.badge, "resident checked out");
                Ok((entry, CheckOutOutcome::Remote))
            }
            Err(err) if err.is_network() => {
                warn!(resident_id = id, error = %err, "store unreachable, checking out locally");
                self.snapshot();
                let mut entry = self.active.remove(idx);
                entry.record.status = STATUS_OUT.to_string();
                entry.sync = SyncState::Pending;
                self.out.push(entry.record.clone());
                Ok((entry, CheckOutOutcome::Offline))
            }
            Err(err) => Err(err),
        }
    }

    pub fn undo(&mut self) -> bool {
        self.undo_step().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.redo_step().is_some()
    }

    /// Undo one step. `Some` holds the ids of store-saved residents that came
    /// back from the departed list. Their store rows are left as they are.
    pub fn undo_step(&mut self) -> Option<Vec<ResidentId>> {
        if !self.history.can_undo() {
            return None;
        }
        let current = self.take_state();
        let previous = self.history.undo(current).unwrap_or_default();
        Some(self.restore(previous))
    }

    pub fn redo_step(&mut self) -> Option<Vec<ResidentId>> {
        if !self.history.can_redo() {
            return None;
        }
        let current = self.take_state();
        let next = self.history.redo(current).unwrap_or_default();
        Some(self.restore(next))
    }

    /// Empty the active roster locally, undoably.
    pub fn clear(&mut self) {
        if self.active.is_empty() {
            return;
        }
        self.snapshot();
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_backend::MemBackend;
    use serde_json::json;

    fn roster() -> Roster {
        Roster::new(50, Duration::ZERO)
    }

    fn patch(value: serde_json::Value) -> ResidentPatch {
        value.as_object().unwrap().clone()
    }

    async fn seeded(backend: &MemBackend) -> Roster {
        let mut r = roster();
        for (badge, first) in [("1", "Amina"), ("2", "Bilal"), ("3", "Chen")] {
            r.add(backend, ResidentRecord::new(badge, first, "Test"))
                .await
                .unwrap();
        }
        r
    }

    fn badges(r: &Roster) -> Vec<String> {
        r.entries().iter().map(|e| e.record.badge.clone()).collect()
    }

    #[tokio::test]
    async fn test_add_swaps_in_store_id() {
        let backend = MemBackend::new();
        let mut r = roster();
        let entry = r
            .add(&backend, ResidentRecord::new("24191", "John", "Doe"))
            .await
            .unwrap();
        assert_eq!(entry.id(), 1);
        assert_eq!(entry.sync, SyncState::Synced);
        assert_eq!(r.entries()[0].id(), 1);
    }

    #[tokio::test]
    async fn test_add_offline_keeps_provisional_entry() {
        let backend = MemBackend::new();
        backend.set_offline(true);
        let mut r = roster();
        let a = r.add(&backend, ResidentRecord::new("1", "A", "A")).await.unwrap();
        let b = r.add(&backend, ResidentRecord::new("2", "B", "B")).await.unwrap();

        assert_eq!(a.sync, SyncState::Pending);
        assert!(a.id() < 0 && b.id() < 0);
        assert_ne!(a.id(), b.id());
        assert_eq!(r.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_badge() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        let err = r
            .add(&backend, ResidentRecord::new("2", "Other", "Person"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShelterError::Api(_)));
        assert_eq!(r.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_add_many_reports_rejections() {
        let backend = MemBackend::new();
        let mut r = roster();
        let outcome = r
            .add_many(
                &backend,
                vec![
                    ResidentRecord::new("1", "A", "A"),
                    ResidentRecord::new("1", "B", "B"),
                    ResidentRecord::new("2", "C", "C"),
                ],
            )
            .await;
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_update_filters_payload_and_keeps_extra_locally() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;

        let (entry, remote) = r
            .update(&backend, 1, &patch(json!({"room": "1.02", "language": "ar"})))
            .await
            .unwrap();

        assert_eq!(remote, RemoteUpdate::Applied);
        assert_eq!(entry.record.room, "1.02");
        assert_eq!(entry.record.extra.get("language"), Some(&json!("ar")));
        let sent = backend.resident_updates();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains_key("room"));
        assert!(!sent[0].1.contains_key("language"));
    }

    #[tokio::test]
    async fn test_update_with_only_local_fields_skips_remote() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        let (_, remote) = r
            .update(&backend, 2, &patch(json!({"language": "fr"})))
            .await
            .unwrap();
        assert_eq!(remote, RemoteUpdate::Skipped);
        assert!(backend.resident_updates().is_empty());
    }

    #[tokio::test]
    async fn test_update_remote_failure_marks_pending() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        backend.set_offline(true);
        let (entry, remote) = r
            .update(&backend, 1, &patch(json!({"room": "2.04"})))
            .await
            .unwrap();
        assert!(matches!(remote, RemoteUpdate::Failed(_)));
        assert_eq!(entry.sync, SyncState::Pending);
        assert_eq!(r.get(1).unwrap().record.room, "2.04");
    }

    #[tokio::test]
    async fn test_update_repairs_rejected_column() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        backend.reject_column("room_remarks");
        let (_, remote) = r
            .update(
                &backend,
                1,
                &patch(json!({"room": "1.01", "room_remarks": "near window"})),
            )
            .await
            .unwrap();
        assert_eq!(
            remote,
            RemoteUpdate::Repaired {
                dropped_field: "room_remarks".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        let err = r
            .update(&backend, 42, &patch(json!({"room": "1"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_undoable_even_if_remote_fails() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        backend.set_offline(true);

        let removal = r.delete(&backend, 2).await.unwrap();
        assert!(removal.remote_error.is_some());
        assert_eq!(badges(&r), vec!["1", "3"]);

        assert!(r.undo());
        assert_eq!(badges(&r), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_undo_redo_linearity() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        let s0 = badges(&r);

        r.delete(&backend, 1).await.unwrap();
        let s1 = badges(&r);
        r.delete_many(&backend, &[2, 3]).await;
        let s2 = badges(&r);
        assert!(s2.is_empty());

        assert!(r.undo());
        assert_eq!(badges(&r), s1);
        assert!(r.undo());
        assert_eq!(badges(&r), s0);
        assert!(!r.undo());

        assert!(r.redo());
        assert_eq!(badges(&r), s1);
        assert!(r.redo());
        assert_eq!(badges(&r), s2);
        assert!(!r.redo());
    }

    #[tokio::test]
    async fn test_new_mutation_clears_redo() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        r.delete(&backend, 1).await.unwrap();
        r.undo();
        assert!(r.can_redo());
        r.delete(&backend, 3).await.unwrap();
        assert!(!r.can_redo());
    }

    #[tokio::test]
    async fn test_add_after_undo_clears_redo() {
        let backend = MemBackend::new();
        let mut r = roster();
        r.add(&backend, ResidentRecord::new("A", "Amina", "Test"))
            .await
            .unwrap();
        r.add(&backend, ResidentRecord::new("B", "Bilal", "Test"))
            .await
            .unwrap();

        r.delete(&backend, 1).await.unwrap();
        assert!(r.undo());
        r.add(&backend, ResidentRecord::new("C", "Chen", "Test"))
            .await
            .unwrap();

        assert!(!r.can_redo());
        assert!(!r.redo());
        assert_eq!(badges(&r), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_update_after_undo_clears_redo() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        r.delete(&backend, 1).await.unwrap();
        assert!(r.undo());

        r.update(&backend, 2, &patch(json!({"room": "2.01"})))
            .await
            .unwrap();

        assert!(!r.can_redo());
        assert_eq!(r.get(2).unwrap().record.room, "2.01");
    }

    #[tokio::test]
    async fn test_check_out_remote() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;

        let (entry, outcome) = r.check_out(&backend, 2).await.unwrap();
        assert_eq!(outcome, CheckOutOutcome::Remote);
        assert_eq!(entry.record.badge, "2");
        assert_eq!(badges(&r), vec!["1", "3"]);
        assert_eq!(r.out_residents().len(), 1);
        assert_eq!(r.out_residents()[0].status, STATUS_OUT);
        assert!(r.can_undo());
    }

    #[tokio::test]
    async fn test_check_out_offline_relocates_locally() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        backend.set_offline(true);

        let (entry, outcome) = r.check_out(&backend, 2).await.unwrap();
        assert_eq!(outcome, CheckOutOutcome::Offline);
        assert_eq!(entry.record.status, STATUS_OUT);
        assert_eq!(r.out_residents()[0].badge, "2");
        assert_eq!(badges(&r), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_undo_check_out_restores_both_lists() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        r.check_out(&backend, 2).await.unwrap();

        let restored = r.undo_step().unwrap();
        assert_eq!(restored, vec![2]);
        assert_eq!(badges(&r), vec!["1", "2", "3"]);
        assert!(r.out_residents().is_empty());

        assert!(r.redo());
        assert_eq!(badges(&r), vec!["1", "3"]);
        assert_eq!(r.out_residents().len(), 1);
        assert_eq!(r.out_residents()[0].badge, "2");
    }

    #[tokio::test]
    async fn test_undo_offline_check_out_restores_both_lists() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        backend.set_offline(true);
        r.check_out(&backend, 3).await.unwrap();

        assert!(r.undo());
        assert_eq!(badges(&r), vec!["1", "2", "3"]);
        assert!(r.out_residents().is_empty());
    }

    #[tokio::test]
    async fn test_check_out_unknown_id() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        assert!(r.check_out(&backend, 99).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_check_out_other_error_leaves_roster() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        // Removed remotely behind our back: the store answers NotFound.
        crate::store::backend::ResidentTable::delete_resident(&backend, 3)
            .await
            .unwrap();

        let err = r.check_out(&backend, 3).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(badges(&r), vec!["1", "2", "3"]);
        assert!(!r.can_undo());
    }

    #[tokio::test]
    async fn test_load_replaces_and_clears_history() {
        let backend = MemBackend::new();
        let mut r = seeded(&backend).await;
        r.delete(&backend, 1).await.unwrap();
        r.clear();

        r.load(&backend).await.unwrap();
        assert_eq!(badges(&r), vec!["2", "3"]);
        assert!(!r.can_undo());
        assert!(r.entries().iter().all(|e| e.sync == SyncState::Synced));
    }
}
