//! # Shelter Architecture
//!
//! Shelter is a **UI-agnostic library for running a reception shelter's roster
//! and resident documents**. The `shelter` binary is one client of it.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/shelter)                                 │
//! │  - Parses arguments, renders results, handles terminal I/O  │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over the roster and the engines              │
//! │  - Returns Result<CmdResult>                                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//! ┌───────────────────────────┐ ┌───────────────────────────────┐
//! │  Roster (roster.rs)       │ │  Engines (commands/*.rs)      │
//! │  - Local-first residents  │ │  - Migration, sync, cleanup   │
//! │  - Undo / redo (history)  │ │  - Partial failure in results │
//! └───────────────────────────┘ └───────────────────────────────┘
//!               │                             │
//!               └──────────────┬──────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - ResidentTable, DocumentTable and ObjectStore traits      │
//! │  - FsBackend (production), MemBackend (testing)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Paths Are Derived, Never Stored Twice
//!
//! Every document lives at `{TYPE}/{badge}_{First}_{Last}/{file}` inside the
//! container for its type. [`naming`] is the single place that builds and parses
//! those paths, and [`matcher`] decides which stored objects belong to a badge
//! when the path was not built by us.
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! From `api.rs` inward, code:
//! - Takes regular Rust arguments and returns regular Rust types
//! - **Never** writes to stdout/stderr
//! - Logs through `tracing` only
//!
//! ## Testing Strategy
//!
//! 1. **Engines and roster**: thorough unit tests against [`store::mem_backend::MemBackend`],
//!    which can be told to fail in specific ways.
//! 2. **API**: dispatch tests, checking what ends up in the `CmdResult`.
//! 3. **Filesystem backend**: integration tests in `tests/` over a temp dir.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade
//! - [`roster`]: Active and departed residents, local-first edits
//! - [`commands`]: Document migration, sync, folder cleanup
//! - [`store`]: Storage traits and backends
//! - [`model`]: Resident and document records
//! - [`naming`]: Folder and file naming rules
//! - [`matcher`]: Badge-to-path matching
//! - [`views`]: Kitchen list, rooms and occupancy
//! - [`history`]: Bounded undo/redo stacks
//! - [`remote`]: Retry and schema repair for store calls
//! - [`config`]: Configuration
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod matcher;
pub mod model;
pub mod naming;
pub mod remote;
pub mod roster;
pub mod store;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod views;
