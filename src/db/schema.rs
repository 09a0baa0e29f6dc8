use rusqlite::Connection;

/// Initialize the directory database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (local mirror of provider identities)
        -- One row per provider subject id. archived = soft delete flag;
        -- event_ts = provider event time of the last applied write.
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            email TEXT,
            name TEXT,
            avatar_url TEXT,
            role TEXT NOT NULL CHECK (role IN ('student', 'instructor', 'admin')),
            archived INTEGER NOT NULL DEFAULT 0,
            event_ts INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_active ON users(id) WHERE archived = 0;

        -- Organizations (tenants)
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            event_ts INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Organization memberships (resolve a user's active tenant context)
        CREATE TABLE IF NOT EXISTS org_memberships (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('admin', 'member')),
            status TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, org_id)
        );
        CREATE INDEX IF NOT EXISTS idx_org_memberships_org ON org_memberships(org_id);
        CREATE INDEX IF NOT EXISTS idx_org_memberships_user ON org_memberships(user_id);

        -- Processed webhook events (duplicate-delivery detection)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(provider, event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_lookup ON webhook_events(provider, event_id);

        -- Dead letters (verified events that failed to apply; retried by sweep)
        CREATE TABLE IF NOT EXISTS dead_letters (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            error TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 1,
            failed_at INTEGER NOT NULL,
            resolved_at INTEGER,
            UNIQUE(provider, event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_dead_letters_unresolved ON dead_letters(failed_at) WHERE resolved_at IS NULL;
        "#,
    )?;
    Ok(())
}
