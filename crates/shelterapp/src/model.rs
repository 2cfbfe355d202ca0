//! # Domain Model
//!
//! Core records shared by every layer: [`ResidentRecord`], [`DocumentRecord`],
//! [`StoredObject`] and the [`DocumentType`] lifecycle phase.
//!
//! ## Badge as Join Key
//!
//! A resident's `badge` is the externally meaningful identifier. It is the key
//! that correlates roster entries, document rows and stored objects. The numeric
//! `id` is assigned by the backing store and means nothing outside of it.
//!
//! ## Provisional Ids
//!
//! Residents added while the store has not answered yet carry a negative id.
//! Store-assigned ids are always positive, so the two never collide.
//!
//! ## Unknown Fields
//!
//! [`ResidentRecord::extra`] keeps any field the backing schema does not know
//! about. Those fields live only in the local copy; [`schema_payload`] strips
//! them before anything goes over the wire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, ShelterError};

pub type ResidentId = i64;

/// A partial resident update, keyed by column name.
pub type ResidentPatch = Map<String, Value>;

/// Columns the backing `residents` table accepts.
pub const RESIDENT_COLUMNS: &[&str] = &[
    "badge",
    "first_name",
    "last_name",
    "room",
    "nationality",
    "ov_number",
    "register_number",
    "date_of_birth",
    "age",
    "gender",
    "reference_person",
    "date_in",
    "date_out",
    "days_of_stay",
    "status",
    "remarks",
    "room_remarks",
];

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_OUT: &str = "OUT";

/// Lifecycle phase of a document: the owner is present (IN) or has departed (OUT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::In => "IN",
            DocumentType::Out => "OUT",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ShelterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(DocumentType::In),
            "OUT" => Ok(DocumentType::Out),
            other => Err(ShelterError::Api(format!(
                "Invalid document type '{}'. Must be IN or OUT.",
                other
            ))),
        }
    }
}

fn default_status() -> String {
    STATUS_ACTIVE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentRecord {
    #[serde(default)]
    pub id: ResidentId,
    pub badge: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub ov_number: Option<String>,
    #[serde(default)]
    pub register_number: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub reference_person: Option<String>,
    #[serde(default)]
    pub date_in: Option<NaiveDate>,
    #[serde(default)]
    pub date_out: Option<NaiveDate>,
    #[serde(default)]
    pub days_of_stay: Option<u32>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub room_remarks: Option<String>,
    /// Fields unknown to the backing schema. Local only.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResidentRecord {
    pub fn new(
        badge: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            badge: badge.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            room: String::new(),
            nationality: String::new(),
            ov_number: None,
            register_number: None,
            date_of_birth: None,
            age: None,
            gender: None,
            reference_person: None,
            date_in: None,
            date_out: None,
            days_of_stay: None,
            status: default_status(),
            remarks: None,
            room_remarks: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn with_id(mut self, id: ResidentId) -> Self {
        self.id = id;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_provisional(&self) -> bool {
        self.id < 0
    }

    /// Merge `patch` into this record. Unknown keys land in [`Self::extra`].
    pub fn apply_patch(&mut self, patch: &ResidentPatch) -> Result<()> {
        let mut value = serde_json::to_value(&*self)?;
        if let Value::Object(map) = &mut value {
            for (key, val) in patch {
                if key == "id" {
                    continue;
                }
                map.insert(key.clone(), val.clone());
            }
        }
        *self = serde_json::from_value(value)?;
        Ok(())
    }
}

/// Keep only the keys the backing `residents` table recognizes.
pub fn schema_payload(patch: &ResidentPatch) -> ResidentPatch {
    patch
        .iter()
        .filter(|(key, _)| RESIDENT_COLUMNS.contains(&key.as_str()))
        .map(|(key, val)| (key.clone(), val.clone()))
        .collect()
}

/// Identity used to derive folder names: a badge plus a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentInfo {
    pub badge: String,
    pub name: String,
}

impl ResidentInfo {
    pub fn new(badge: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            badge: badge.into(),
            name: name.into(),
        }
    }
}

impl From<&ResidentRecord> for ResidentInfo {
    fn from(record: &ResidentRecord) -> Self {
        Self::new(record.badge.clone(), record.full_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub resident_id: Option<ResidentId>,
    pub document_type: DocumentType,
    pub file_name: String,
    /// Public locator of the stored bytes.
    pub file_path: String,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
    pub resident_badge: Option<String>,
    pub resident_name: Option<String>,
    pub storage_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the `documents` table. The store assigns the id and
/// fills missing timestamps with the insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub resident_id: Option<ResidentId>,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
    pub resident_badge: Option<String>,
    pub resident_name: Option<String>,
    pub storage_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewDocument {
    pub fn new(
        resident_id: Option<ResidentId>,
        document_type: DocumentType,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            resident_id,
            document_type,
            file_name: file_name.into(),
            file_path: file_path.into(),
            file_size: None,
            mime_type: None,
            description: None,
            uploaded_by: None,
            resident_badge: None,
            resident_name: None,
            storage_path: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> DocumentRecord {
        DocumentRecord {
            id,
            resident_id: self.resident_id,
            document_type: self.document_type,
            file_name: self.file_name,
            file_path: self.file_path,
            file_size: self.file_size,
            mime_type: self.mime_type,
            description: self.description,
            uploaded_by: self.uploaded_by,
            resident_badge: self.resident_badge,
            resident_name: self.resident_name,
            storage_path: self.storage_path,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

/// Row filter for `documents` queries. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub resident_id: Option<ResidentId>,
    pub document_type: Option<DocumentType>,
    pub file_name: Option<String>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_resident(resident_id: ResidentId, document_type: DocumentType) -> Self {
        Self {
            resident_id: Some(resident_id),
            document_type: Some(document_type),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn matches(&self, doc: &DocumentRecord) -> bool {
        self.resident_id.is_none_or(|id| doc.resident_id == Some(id))
            && self.document_type.is_none_or(|t| doc.document_type == t)
            && self
                .file_name
                .as_ref()
                .is_none_or(|name| &doc.file_name == name)
    }
}

/// An object as reported by a container listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    pub path: String,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredObject {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            name,
            path,
            size: None,
            mime_type: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
