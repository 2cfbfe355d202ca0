//! # Storage Layer
//!
//! Shelter talks to one backing store through three traits, all defined in
//! [`backend`]:
//!
//! - [`backend::ResidentTable`]: the `residents` and `out_residents` tables.
//! - [`backend::DocumentTable`]: the `documents` table.
//! - [`backend::ObjectStore`]: blob containers holding the document bytes.
//!
//! [`backend::Backend`] bundles the three; engines and the API are generic over it.
//!
//! ## Two Sources of Truth
//!
//! Document rows and stored objects are written in separate steps with no
//! transaction across them. A crash between an upload and the row insert leaves
//! an object with no row. That is expected: the sync command scans a container
//! and creates rows for whatever the relational side is missing.
//!
//! ```text
//! container  administrative-documents       documents table
//! ├── IN/24191_John_Doe/passport.pdf   ◄──  row (24191, IN, passport.pdf)
//! └── IN/24191_John_Doe/scan.jpg            (missing: sync recreates it)
//! ```
//!
//! ## Implementations
//!
//! - [`mem_backend::MemBackend`]: in-memory, with fault injection for tests.
//! - [`fs_backend::FsBackend`]: directories for containers, JSON files for tables.
//!
//! All methods are `async` and the implementations are `Send + Sync`, so
//! several residents can be migrated concurrently against one backend.

pub mod backend;
pub mod fs_backend;
pub mod mem_backend;
