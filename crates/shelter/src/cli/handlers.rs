//! One handler per subcommand. Handlers call the API and hand back its
//! `CmdResult`; they never print.

use serde_json::Value;
use shelterapp::api::ShelterApi;
use shelterapp::commands::CmdResult;
use shelterapp::error::{Result, ShelterError};
use shelterapp::model::{ResidentPatch, ResidentRecord, RESIDENT_COLUMNS};
use shelterapp::store::backend::Backend;

use super::setup::Commands;

pub async fn dispatch<B: Backend>(api: &mut ShelterApi<B>, command: Commands) -> Result<CmdResult> {
    api.load().await?;

    match command {
        Commands::Residents { room, wing, out } => {
            if out {
                api.out_residents()
            } else if let Some(room) = room {
                api.residents_in_room(&room)
            } else if let Some(wing) = wing {
                api.residents_in_wing(wing.into())
            } else {
                api.residents()
            }
        }
        Commands::Add {
            badge,
            first,
            last,
            room,
        } => {
            let mut record = ResidentRecord::new(badge, first, last);
            if let Some(room) = room {
                record = record.with_room(room);
            }
            api.add_resident(record).await
        }
        Commands::Update { id, fields } => {
            let patch = parse_patch(&fields)?;
            api.update_resident(id, &patch).await
        }
        Commands::Delete { ids } => {
            if ids.len() == 1 {
                api.delete_resident(ids[0]).await
            } else {
                api.delete_residents(&ids).await
            }
        }
        Commands::Checkout { id } => api.check_out_resident(id).await,
        Commands::Migrate { id } => api.migrate_resident_documents(id).await,
        Commands::Copy { id } => api.copy_resident_documents(id).await,
        Commands::Sync {
            badge,
            resident_id,
            document_type,
        } => {
            api.sync_resident_documents(&badge, resident_id, document_type.into())
                .await
        }
        Commands::Cleanup { id } => api.delete_resident_folders(id).await,
        Commands::Status { id } => api.transfer_status(id).await,
        Commands::Dedupe => api.cleanup_duplicates().await,
        Commands::Kitchen => api.kitchen_list(),
        Commands::Occupancy => api.occupancy(),
    }
}

const NUMERIC_COLUMNS: &[&str] = &["age", "days_of_stay"];

/// Build a patch from `key=value` arguments.
///
/// Store columns are text except the numeric ones. Fields outside the store
/// schema are read as JSON when they parse (`siblings=2`), as text otherwise.
/// `null` clears any field.
pub fn parse_patch(fields: &[String]) -> Result<ResidentPatch> {
    let mut patch = ResidentPatch::new();
    for field in fields {
        let (key, raw) = field
            .split_once('=')
            .ok_or_else(|| ShelterError::Api(format!("Expected key=value, got '{}'", field)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ShelterError::Api(format!("Missing field name in '{}'", field)));
        }
        let text = || Value::String(raw.to_string());
        let value = if raw == "null" {
            Value::Null
        } else if RESIDENT_COLUMNS.contains(&key) && !NUMERIC_COLUMNS.contains(&key) {
            text()
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| text())
        };
        patch.insert(key.to_string(), value);
    }
    Ok(patch)
}
