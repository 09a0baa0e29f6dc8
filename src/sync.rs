//! Identity synchronizer.
//!
//! Applies a canonical webhook event to the local mirror. Deduplication and
//! the domain write happen inside one transaction, so a failed write also
//! rolls back the dedup record and the event stays eligible for retry.

use rusqlite::Connection;

use crate::db::queries::{self, WriteOutcome};
use crate::error::Result;
use crate::providers::{EventAction, WebhookEvent};

/// Result of applying an event to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The event mutated local state.
    Applied,
    /// The event id was already processed; nothing changed.
    Duplicate,
    /// The targeted row already reflects a newer provider event.
    Stale,
    /// Unhandled event type or a delete for a user never synced.
    Ignored,
}

/// Apply one event atomically: record the event id and perform the domain
/// write in the same transaction. Replays of an already-processed id return
/// [`SyncOutcome::Duplicate`] without touching domain rows.
pub fn apply_event(
    conn: &mut Connection,
    provider: &str,
    event: &WebhookEvent,
) -> Result<SyncOutcome> {
    let tx = conn.transaction()?;

    if !queries::try_record_webhook_event(&tx, provider, &event.id)? {
        tx.rollback()?;
        return Ok(SyncOutcome::Duplicate);
    }

    let outcome = match &event.action {
        EventAction::UserUpserted(input) => {
            match queries::upsert_user_from_event(&tx, input, event.occurred_at)? {
                WriteOutcome::Applied => SyncOutcome::Applied,
                WriteOutcome::Stale | WriteOutcome::NotFound => SyncOutcome::Stale,
            }
        }
        EventAction::UserDeleted { external_id } => {
            match queries::archive_user_from_event(&tx, external_id, event.occurred_at)? {
                WriteOutcome::Applied => SyncOutcome::Applied,
                WriteOutcome::Stale => SyncOutcome::Stale,
                // A delete for a user we never saw: nothing to archive, and
                // materializing a pre-archived row would serve no reader.
                WriteOutcome::NotFound => SyncOutcome::Ignored,
            }
        }
        EventAction::OrganizationCreated(input) => {
            if queries::get_organization_by_external_id(&tx, &input.external_id)?.is_some() {
                SyncOutcome::Ignored
            } else {
                queries::create_organization_with_admin(&tx, input, event.occurred_at)?;
                SyncOutcome::Applied
            }
        }
        EventAction::Ignored => SyncOutcome::Ignored,
    };

    tx.commit()?;
    Ok(outcome)
}
