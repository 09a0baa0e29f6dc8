//! Test utilities and fixtures for Rollcall integration tests

#![allow(dead_code)]

use axum::http::{HeaderMap, HeaderValue};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use rollcall::db::{init_db, queries, AppState, DbPool};
pub use rollcall::models::*;
pub use rollcall::providers::{EventAction, WebhookEvent};

pub const WORKOS_TEST_SECRET: &str = "workos_test_secret";

/// Raw key bytes behind the Clerk test secret.
pub const CLERK_TEST_KEY: &[u8] = b"clerk_test_signing_key";

pub fn clerk_test_secret() -> String {
    format!("whsec_{}", BASE64.encode(CLERK_TEST_KEY))
}

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an in-memory pool. Size 1 so every caller sees the same database.
pub fn setup_test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

/// Create an AppState with both provider secrets configured
pub fn setup_test_state() -> AppState {
    AppState {
        db: setup_test_pool(),
        workos_webhook_secret: Some(WORKOS_TEST_SECRET.to_string()),
        clerk_webhook_secret: Some(clerk_test_secret()),
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn hmac_hex(key: &[u8], message: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn hmac_b64(key: &[u8], message: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Build a `workos-signature` header value for a payload
pub fn sign_workos(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = [timestamp.to_string().as_bytes(), b".", payload].concat();
    format!(
        "t={},v1={}",
        timestamp,
        hmac_hex(secret.as_bytes(), &signed_payload)
    )
}

/// Build headers for a WorkOS delivery signed with the given secret
pub fn workos_headers(payload: &[u8], secret: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "workos-signature",
        HeaderValue::from_str(&sign_workos(payload, secret, now())).unwrap(),
    );
    headers
}

/// Build the three svix headers for a Clerk delivery signed with the raw key
pub fn clerk_headers(msg_id: &str, payload: &[u8], key: &[u8]) -> HeaderMap {
    let timestamp = now().to_string();
    let message = [
        msg_id.as_bytes(),
        b".",
        timestamp.as_bytes(),
        b".",
        payload,
    ]
    .concat();
    let signature = format!("v1,{}", hmac_b64(key, &message));

    let mut headers = HeaderMap::new();
    headers.insert("svix-id", HeaderValue::from_str(msg_id).unwrap());
    headers.insert("svix-timestamp", HeaderValue::from_str(&timestamp).unwrap());
    headers.insert("svix-signature", HeaderValue::from_str(&signature).unwrap());
    headers
}

/// Build a WorkOS user event body
pub fn workos_user_event(event_id: &str, event: &str, user_id: &str, email: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "event": event,
        "data": {
            "id": user_id,
            "email": email,
            "first_name": "Test",
            "last_name": "User"
        },
        "created_at": now()
    })
    .to_string()
}

/// Build a canonical upsert event for direct synchronizer tests
pub fn upsert_event(event_id: &str, external_id: &str, occurred_at: i64) -> WebhookEvent {
    WebhookEvent {
        id: event_id.to_string(),
        event_type: "user.created".to_string(),
        occurred_at,
        action: EventAction::UserUpserted(UpsertUser {
            external_id: external_id.to_string(),
            email: Some(format!("{}@example.com", external_id)),
            name: Some("Test User".to_string()),
            avatar_url: None,
        }),
    }
}
