//! # Configuration
//!
//! Shelter configuration is loaded with [`confique`] from layered sources.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `SHELTER_UNDO_LIMIT`, `SHELTER_RETRY_DELAY_MS`, etc.
//! 2. **Data directory file**: `shelter.toml` inside the data directory.
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! The data directory is whatever the caller passes in (the CLI's `--data`), or
//! the platform data directory from [`directories`] when nothing is given.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `storage.incoming_container` | `administrative-documents` | Container for IN documents |
//! | `storage.departed_container` | `administrative-documents-out` | Container for OUT documents |
//! | `storage.public_base_url` | `file://shelter/public` | Prefix of public locators |
//! | `roster.undo_limit` | `50` | Snapshots kept on each history stack |
//! | `remote.retry_delay_ms` | `500` | Pause before the single network retry |
//! | `matching.weak_suffix_match` | `true` | Enable the last-three-digits fallback |
//! | `sync.uploader_tag` | `sync` | `uploaded_by` value on synthesized rows |

use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ShelterError};
use crate::model::DocumentType;

pub const CONFIG_FILE: &str = "shelter.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShelterConfig {
    #[config(nested)]
    pub storage: StorageConfig,

    #[config(nested)]
    pub roster: RosterConfig,

    #[config(nested)]
    pub remote: RemoteConfig,

    #[config(nested)]
    pub matching: MatchingConfig,

    #[config(nested)]
    pub sync: SyncConfig,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Container holding documents of present residents.
    #[config(default = "administrative-documents", env = "SHELTER_INCOMING_CONTAINER")]
    pub incoming_container: String,

    /// Container holding documents of departed residents.
    #[config(
        default = "administrative-documents-out",
        env = "SHELTER_DEPARTED_CONTAINER"
    )]
    pub departed_container: String,

    #[config(default = "file://shelter/public", env = "SHELTER_PUBLIC_BASE_URL")]
    pub public_base_url: String,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RosterConfig {
    #[config(default = 50, env = "SHELTER_UNDO_LIMIT")]
    pub undo_limit: usize,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    #[config(default = 500, env = "SHELTER_RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MatchingConfig {
    #[config(default = true, env = "SHELTER_WEAK_SUFFIX_MATCH")]
    pub weak_suffix_match: bool,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    #[config(default = "sync", env = "SHELTER_UPLOADER_TAG")]
    pub uploader_tag: String,
}

impl Default for ShelterConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                incoming_container: "administrative-documents".to_string(),
                departed_container: "administrative-documents-out".to_string(),
                public_base_url: "file://shelter/public".to_string(),
            },
            roster: RosterConfig { undo_limit: 50 },
            remote: RemoteConfig {
                retry_delay_ms: 500,
            },
            matching: MatchingConfig {
                weak_suffix_match: true,
            },
            sync: SyncConfig {
                uploader_tag: "sync".to_string(),
            },
        }
    }
}

impl ShelterConfig {
    /// Load from the environment and `shelter.toml` in `data_dir`.
    /// A missing file is not an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        Ok(ShelterConfig::builder()
            .env()
            .file(data_dir.join(CONFIG_FILE))
            .load()?)
    }

    /// Container that holds documents of the given phase.
    pub fn container(&self, document_type: DocumentType) -> &str {
        match document_type {
            DocumentType::In => &self.storage.incoming_container,
            DocumentType::Out => &self.storage.departed_container,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.remote.retry_delay_ms)
    }

    /// Config with no retry pause, for tests.
    pub fn without_retry_delay(mut self) -> Self {
        self.remote.retry_delay_ms = 0;
        self
    }
}

/// Platform data directory for shelter.
pub fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("org", "shelter", "shelter")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| ShelterError::Config("Could not determine a data directory".to_string()))
}
