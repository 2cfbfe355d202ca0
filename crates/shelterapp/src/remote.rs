//! Recovery policies for calls into the backing store.
//!
//! Two failures are recovered locally, each exactly once:
//!
//! - a network error is retried after a fixed pause ([`with_retry`]);
//! - a resident update rejected for an unknown column is retried without
//!   that column ([`update_with_repair`]).
//!
//! Anything else goes straight back to the caller.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, ShelterError};
use crate::model::{ResidentId, ResidentPatch, ResidentRecord};
use crate::store::backend::ResidentTable;

/// Run `op`, and once more after `delay` if the first attempt hit the network.
pub async fn with_retry<T, F, Fut>(delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(err) if err.is_network() => {
            warn!(error = %err, delay_ms = delay.as_millis() as u64, "network error, retrying once");
            tokio::time::sleep(delay).await;
            op().await
        }
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// `None` when dropping the rejected field left nothing to send.
    pub record: Option<ResidentRecord>,
    pub dropped_field: Option<String>,
}

/// Update a resident, dropping one rejected column and retrying if needed.
pub async fn update_with_repair<R>(
    table: &R,
    id: ResidentId,
    payload: ResidentPatch,
    delay: Duration,
) -> Result<RepairOutcome>
where
    R: ResidentTable + ?Sized,
{
    let first = with_retry(delay, || table.update_resident(id, &payload)).await;
    let field = match first {
        Ok(record) => {
            return Ok(RepairOutcome {
                record: Some(record),
                dropped_field: None,
            })
        }
        Err(ShelterError::SchemaMismatch { field, .. }) if payload.contains_key(&field) => field,
        Err(err) => return Err(err),
    };

    warn!(resident_id = id, field = %field, "store rejected field, retrying without it");
    let mut repaired = payload;
    repaired.remove(&field);
    if repaired.is_empty() {
        return Ok(RepairOutcome {
            record: None,
            dropped_field: Some(field),
        });
    }

    let record = with_retry(delay, || table.update_resident(id, &repaired)).await?;
    Ok(RepairOutcome {
        record: Some(record),
        dropped_field: Some(field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_backend::MemBackend;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn patch(value: serde_json::Value) -> ResidentPatch {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_with_retry_retries_network_once() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<u32> = with_retry(Duration::ZERO, || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ShelterError::Network("down".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_second_failure() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<()> = with_retry(Duration::ZERO, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ShelterError::Network("down".into()))
        })
        .await;
        assert!(result.unwrap_err().is_network());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_other_errors() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<()> = with_retry(Duration::ZERO, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ShelterError::Store("nope".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_with_repair_drops_rejected_field() {
        let backend = MemBackend::new();
        let r = backend
            .insert_resident(&ResidentRecord::new("1", "A", "B"))
            .await
            .unwrap();
        backend.reject_column("room_remarks");

        let outcome = update_with_repair(
            &backend,
            r.id,
            patch(json!({"room": "1.01", "room_remarks": "window"})),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(outcome.dropped_field.as_deref(), Some("room_remarks"));
        assert_eq!(outcome.record.unwrap().room, "1.01");
        assert_eq!(backend.resident_updates().len(), 2);
    }

    #[tokio::test]
    async fn test_update_with_repair_nothing_left() {
        let backend = MemBackend::new();
        let r = backend
            .insert_resident(&ResidentRecord::new("1", "A", "B"))
            .await
            .unwrap();
        backend.reject_column("room_remarks");

        let outcome = update_with_repair(
            &backend,
            r.id,
            patch(json!({"room_remarks": "window"})),
            Duration::ZERO,
        )
        .await
        .unwrap();
        assert!(outcome.record.is_none());
        assert_eq!(backend.resident_updates().len(), 1);
    }
}
