//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str =
    "id, external_id, email, name, avatar_url, role, archived, event_ts, created_at, updated_at";

pub const ORGANIZATION_COLS: &str = "id, external_id, name, event_ts, created_at, updated_at";

pub const ORG_MEMBERSHIP_COLS: &str = "id, user_id, org_id, role, status, created_at";

pub const DEAD_LETTER_COLS: &str =
    "id, provider, event_id, event_type, payload, error, attempts, failed_at, resolved_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            external_id: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            avatar_url: row.get(4)?,
            role: parse_enum(row, 5, "role")?,
            archived: row.get::<_, i32>(6)? != 0,
            event_ts: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Organization {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Organization {
            id: row.get(0)?,
            external_id: row.get(1)?,
            name: row.get(2)?,
            event_ts: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for OrgMembership {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrgMembership {
            id: row.get(0)?,
            user_id: row.get(1)?,
            org_id: row.get(2)?,
            role: parse_enum(row, 3, "role")?,
            status: parse_enum(row, 4, "status")?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for DeadLetter {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DeadLetter {
            id: row.get(0)?,
            provider: row.get(1)?,
            event_id: row.get(2)?,
            event_type: row.get(3)?,
            payload: row.get(4)?,
            error: row.get(5)?,
            attempts: row.get(6)?,
            failed_at: row.get(7)?,
            resolved_at: row.get(8)?,
        })
    }
}
