//! Background maintenance: dead-letter retries and event-id retention.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};

use crate::config::Config;
use crate::db::{queries, DbPool};
use crate::error::Result;
use crate::providers::{self, EventAction};
use crate::sync;

const SWEEP_BATCH_SIZE: i64 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub retried: usize,
    pub resolved: usize,
    pub still_failing: usize,
    pub purged_events: usize,
}

/// Spawn the periodic sweep loop. Runs until the process shuts down.
pub fn spawn_sweep_task(pool: DbPool, config: &Config) {
    let interval = Duration::from_secs(config.sweep_interval_secs);
    let retention_days = config.webhook_retention_days;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match run_sweep(&pool, retention_days) {
                Ok(stats) if stats.retried > 0 || stats.purged_events > 0 => {
                    tracing::info!(
                        "Sweep: retried={}, resolved={}, still_failing={}, purged_events={}",
                        stats.retried,
                        stats.resolved,
                        stats.still_failing,
                        stats.purged_events
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Sweep failed: {}", e),
            }
        }
    });
}

/// One sweep pass: retry unresolved dead letters from their stored payloads,
/// then purge processed-event records past retention.
pub fn run_sweep(pool: &DbPool, retention_days: i64) -> Result<SweepStats> {
    let mut conn = pool.get()?;
    let mut stats = SweepStats::default();

    let dead_letters = queries::list_unresolved_dead_letters(&conn, SWEEP_BATCH_SIZE)?;
    for letter in dead_letters {
        stats.retried += 1;

        let Some(adapter) = providers::adapter_for(&letter.provider) else {
            tracing::warn!(
                "Dead letter {} has unknown provider {}",
                letter.id,
                letter.provider
            );
            stats.still_failing += 1;
            continue;
        };

        // Re-parse the stored payload. For header-addressed providers the
        // delivery id header is reconstructed from the stored event id.
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&letter.event_id) {
            headers.insert("svix-id", value);
        }

        let event = match adapter.parse(&headers, letter.payload.as_bytes()) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Dead letter {} payload no longer parses: {}", letter.id, e);
                queries::record_dead_letter(
                    &conn,
                    &letter.provider,
                    &letter.event_id,
                    &letter.event_type,
                    &letter.payload,
                    &e.to_string(),
                )?;
                stats.still_failing += 1;
                continue;
            }
        };

        // Ignored here means the event type was dropped from the routing
        // table since the failure; resolve it rather than retry forever.
        if matches!(event.action, EventAction::Ignored) {
            queries::resolve_dead_letter(&conn, &letter.id)?;
            stats.resolved += 1;
            continue;
        }

        match sync::apply_event(&mut conn, &letter.provider, &event) {
            Ok(outcome) => {
                tracing::info!(
                    "Dead letter {} replayed: event={}, outcome={:?}",
                    letter.id,
                    letter.event_id,
                    outcome
                );
                queries::resolve_dead_letter(&conn, &letter.id)?;
                stats.resolved += 1;
            }
            Err(e) => {
                tracing::warn!("Dead letter {} retry failed: {}", letter.id, e);
                queries::record_dead_letter(
                    &conn,
                    &letter.provider,
                    &letter.event_id,
                    &letter.event_type,
                    &letter.payload,
                    &e.to_string(),
                )?;
                stats.still_failing += 1;
            }
        }
    }

    stats.purged_events = queries::purge_old_webhook_events(&conn, retention_days)?;

    Ok(stats)
}
