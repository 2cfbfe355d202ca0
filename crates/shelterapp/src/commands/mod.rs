//! # Command Layer
//!
//! This module contains the **document engines** of shelter. Each one lives in
//! its own submodule as plain async functions over a [`Backend`](crate::store::backend::Backend).
//!
//! ## Role and Responsibilities
//!
//! Engines are where the work on stored documents happens:
//! - Derive canonical paths through [`crate::naming`]
//! - Talk to the backing store through the storage traits
//! - Accumulate per-item failures into their result structs instead of failing
//! - Are completely UI-agnostic
//!
//! ## What Commands Do NOT Do
//!
//! - **Any terminal I/O**: they log through `tracing` and return data
//! - **Argument parsing**: that's the CLI layer's job
//! - **Roster state**: the in-memory roster lives in [`crate::roster`]
//!
//! ## Partial Failure
//!
//! A failure on one document never aborts the others. Only failures that make
//! the whole operation meaningless (a listing or query that cannot run)
//! propagate as `Err`.
//!
//! ## Structured Returns
//!
//! The API wraps engine results in [`CmdResult`], which carries the affected
//! residents, whatever report the operation produced, and leveled messages.
//! The UI decides how to render them.
//!
//! ## Command Modules
//!
//! - [`cleanup`]: List, verify and delete resident folders
//! - [`migrate`]: Move IN documents to OUT, then clean the source
//! - [`sync`]: Create missing rows for stored files; remove duplicate rows

use serde::Serialize;

use crate::model::ResidentRecord;
use crate::roster::RosterEntry;
use crate::views::{KitchenEntry, Occupancy};

pub mod cleanup;
pub mod migrate;
pub mod sync;

use cleanup::DeleteAllResult;
use migrate::{MigrationResult, TransferStatus};
use sync::{DuplicateReport, SyncReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// The report an operation produced, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Report {
    Migration(MigrationResult),
    Sync(SyncReport),
    Cleanup(DeleteAllResult),
    TransferStatus(TransferStatus),
    Duplicates(DuplicateReport),
    Kitchen(Vec<KitchenEntry>),
    Occupancy(Occupancy),
}

#[derive(Debug, Default, Serialize)]
pub struct CmdResult {
    /// Residents created, changed or removed by the operation.
    pub affected: Vec<RosterEntry>,
    /// Residents to display.
    pub listed: Vec<ResidentRecord>,
    pub report: Option<Report>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected(mut self, entries: Vec<RosterEntry>) -> Self {
        self.affected = entries;
        self
    }

    pub fn with_listed(mut self, residents: Vec<ResidentRecord>) -> Self {
        self.listed = residents;
        self
    }

    pub fn with_report(mut self, report: Report) -> Self {
        self.report = Some(report);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == MessageLevel::Error)
    }
}
