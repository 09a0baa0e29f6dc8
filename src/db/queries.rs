use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    query_all, query_one, DEAD_LETTER_COLS, ORGANIZATION_COLS, ORG_MEMBERSHIP_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Outcome of applying an event-sourced write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row was inserted or updated.
    Applied,
    /// The event carried an older provider timestamp than the stored row
    /// and was skipped (last-writer-by-event-time, not by arrival order).
    Stale,
    /// No matching row existed to update.
    NotFound,
}

// ============ Users ============

/// Upsert a user keyed on the provider's external id.
///
/// The default role is set on first creation only; updates never touch it.
/// Fields the provider omitted keep their stored values. The write is guarded
/// by `event_ts`: an event older than the last applied one is skipped.
pub fn upsert_user_from_event(
    conn: &Connection,
    input: &UpsertUser,
    occurred_at: i64,
) -> Result<WriteOutcome> {
    let now = now();
    let email = input.email.as_ref().map(|e| e.trim().to_lowercase());

    let affected = conn.execute(
        "INSERT INTO users (id, external_id, email, name, avatar_url, role, archived, event_ts, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)
         ON CONFLICT(external_id) DO UPDATE SET
             email = COALESCE(excluded.email, users.email),
             name = COALESCE(excluded.name, users.name),
             avatar_url = COALESCE(excluded.avatar_url, users.avatar_url),
             event_ts = excluded.event_ts,
             updated_at = excluded.updated_at
         WHERE excluded.event_ts >= users.event_ts",
        params![
            gen_id(),
            &input.external_id,
            email,
            &input.name,
            &input.avatar_url,
            UserRole::Student.as_str(),
            occurred_at,
            now
        ],
    )?;

    Ok(if affected > 0 {
        WriteOutcome::Applied
    } else {
        WriteOutcome::Stale
    })
}

/// Archive a user (soft delete). The row is never removed, so memberships and
/// other references stay valid. Guarded by `event_ts` like the upsert.
pub fn archive_user_from_event(
    conn: &Connection,
    external_id: &str,
    occurred_at: i64,
) -> Result<WriteOutcome> {
    let affected = conn.execute(
        "UPDATE users SET archived = 1, event_ts = ?2, updated_at = ?3
         WHERE external_id = ?1 AND event_ts <= ?2",
        params![external_id, occurred_at, now()],
    )?;

    if affected > 0 {
        return Ok(WriteOutcome::Applied);
    }

    // Distinguish "no such user" from "newer write already applied".
    match get_user_by_external_id(conn, external_id)? {
        Some(_) => Ok(WriteOutcome::Stale),
        None => Ok(WriteOutcome::NotFound),
    }
}

pub fn get_user_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE external_id = ?1", USER_COLS),
        &[&external_id],
    )
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

// ============ Organizations ============

/// Create an organization plus the inviting user's admin membership.
///
/// The membership is only written after the organization insert succeeded;
/// callers wrap this in a transaction so a partial failure rolls back both.
/// If the inviting user has not been synced yet, a minimal user row is
/// created so the membership has something to point at.
pub fn create_organization_with_admin(
    conn: &Connection,
    input: &CreateOrganization,
    occurred_at: i64,
) -> Result<Organization> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO organizations (id, external_id, name, event_ts, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, &input.external_id, &input.name, occurred_at, now],
    )?;

    if let Some(ref inviter_external_id) = input.created_by {
        let user = match get_user_by_external_id(conn, inviter_external_id)? {
            Some(u) => u,
            None => {
                upsert_user_from_event(
                    conn,
                    &UpsertUser {
                        external_id: inviter_external_id.clone(),
                        email: None,
                        name: None,
                        avatar_url: None,
                    },
                    occurred_at,
                )?;
                get_user_by_external_id(conn, inviter_external_id)?.ok_or_else(|| {
                    crate::error::AppError::Internal(format!(
                        "Upserted inviter {} not found",
                        inviter_external_id
                    ))
                })?
            }
        };

        conn.execute(
            "INSERT INTO org_memberships (id, user_id, org_id, role, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                gen_id(),
                &user.id,
                &id,
                MembershipRole::Admin.as_str(),
                MembershipStatus::Active.as_str(),
                now
            ],
        )?;
    }

    Ok(Organization {
        id,
        external_id: input.external_id.clone(),
        name: input.name.clone(),
        event_ts: occurred_at,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_organization_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> Result<Option<Organization>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM organizations WHERE external_id = ?1",
            ORGANIZATION_COLS
        ),
        &[&external_id],
    )
}

// ============ Memberships ============

/// List a user's memberships, newest first. Used to resolve the active
/// tenant context for a signed-in user.
pub fn list_memberships_for_user(conn: &Connection, user_id: &str) -> Result<Vec<OrgMembership>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM org_memberships WHERE user_id = ?1 ORDER BY created_at DESC",
            ORG_MEMBERSHIP_COLS
        ),
        &[&user_id],
    )
}

pub fn get_membership(
    conn: &Connection,
    user_id: &str,
    org_id: &str,
) -> Result<Option<OrgMembership>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM org_memberships WHERE user_id = ?1 AND org_id = ?2",
            ORG_MEMBERSHIP_COLS
        ),
        &[&user_id, &org_id],
    )
}

// ============ Webhook Event Deduplication ============

/// Atomically record a webhook event, returning true if this is a new event.
/// Returns false if the event id was already processed.
///
/// Uses INSERT OR IGNORE for atomicity - if the (provider, event_id) pair
/// already exists, the insert is silently ignored and we return false.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, provider, event_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![gen_id(), provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Purge processed-event records beyond the retention period. Providers stop
/// retrying deliveries after a few days, so old ids are dead weight.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Dead Letters ============

/// Record a failed event application. Replayed failures for the same event id
/// bump the attempt counter instead of inserting a second row.
pub fn record_dead_letter(
    conn: &Connection,
    provider: &str,
    event_id: &str,
    event_type: &str,
    payload: &str,
    error: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO dead_letters (id, provider, event_id, event_type, payload, error, attempts, failed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
         ON CONFLICT(provider, event_id) DO UPDATE SET
             attempts = dead_letters.attempts + 1,
             error = excluded.error,
             failed_at = excluded.failed_at,
             resolved_at = NULL",
        params![gen_id(), provider, event_id, event_type, payload, error, now()],
    )?;
    Ok(())
}

/// List unresolved dead letters, oldest failures first.
pub fn list_unresolved_dead_letters(conn: &Connection, limit: i64) -> Result<Vec<DeadLetter>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM dead_letters WHERE resolved_at IS NULL ORDER BY failed_at ASC LIMIT ?1",
            DEAD_LETTER_COLS
        ),
        &[&limit],
    )
}

pub fn resolve_dead_letter(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE dead_letters SET resolved_at = ?2 WHERE id = ?1 AND resolved_at IS NULL",
        params![id, now()],
    )?;
    Ok(affected > 0)
}
