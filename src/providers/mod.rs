//! Webhook provider adapters.
//!
//! Each identity provider signs and shapes its deliveries differently. The
//! adapters verify the provider-specific signature scheme against the raw
//! request bytes and normalize the payload into a canonical [`WebhookEvent`],
//! so the synchronizer never sees provider-specific field names.

pub mod clerk;
pub mod workos;

pub use clerk::ClerkProvider;
pub use workos::WorkosProvider;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::{CreateOrganization, UpsertUser};
use crate::sync::{self, SyncOutcome};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
pub(crate) const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for timestamps from the future (in seconds).
pub(crate) const FUTURE_SKEW_SECS: i64 = 60;

/// Provider-agnostic write derived from an event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    /// `user.created` / `user.updated` - idempotent upsert by external id.
    UserUpserted(UpsertUser),
    /// `user.deleted` - archive, never remove.
    UserDeleted { external_id: String },
    /// `organization.created` - organization plus initial admin membership.
    OrganizationCreated(CreateOrganization),
    /// Event type outside the routing table - acknowledged, no mutation.
    Ignored,
}

/// Canonical representation of a webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider's unique event id, the idempotency key.
    pub id: String,
    /// Provider's event type string, kept for logging and dead letters.
    pub event_type: String,
    /// Provider-side event time (Unix seconds). Drives the
    /// last-writer-by-event-time guard in the synchronizer.
    pub occurred_at: i64,
    pub action: EventAction,
}

/// Trait for identity provider webhook handling.
///
/// Implementors supply signature verification and payload normalization;
/// [`handle_webhook`] supplies the shared pipeline around them.
pub trait WebhookProvider: Send + Sync {
    /// Provider name for routing, logging, and database storage.
    fn provider_name(&self) -> &'static str;

    /// Verify the delivery's signature against the raw body bytes.
    ///
    /// Fails with `MalformedSignature` when a required header or segment is
    /// absent, and `SignatureInvalid` on digest mismatch or a timestamp
    /// outside tolerance. Either failure rejects the delivery with a 401.
    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> Result<()>;

    /// Normalize the payload into a canonical event. Event types outside the
    /// routing table parse to `EventAction::Ignored`, not an error.
    fn parse(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent>;
}

/// Look up the adapter for a stored provider name (used by the dead-letter
/// sweep to re-parse stored payloads).
pub fn adapter_for(provider: &str) -> Option<&'static dyn WebhookProvider> {
    match provider {
        "workos" => Some(&WorkosProvider),
        "clerk" => Some(&ClerkProvider),
        _ => None,
    }
}

// ============ Shared verification helpers ============

/// Compute HMAC-SHA256 over `message`.
pub(crate) fn hmac_sha256(secret: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Reject timestamps outside the replay tolerance window.
pub(crate) fn check_timestamp_tolerance(provider: &str, timestamp: i64) -> Result<()> {
    let age = chrono::Utc::now().timestamp() - timestamp;

    if age > TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "{} webhook rejected: timestamp too old (age={}s, max={}s)",
            provider,
            age,
            TIMESTAMP_TOLERANCE_SECS
        );
        return Err(AppError::SignatureInvalid);
    }

    if age < -FUTURE_SKEW_SECS {
        tracing::warn!(
            "{} webhook rejected: timestamp in the future (age={}s)",
            provider,
            age
        );
        return Err(AppError::SignatureInvalid);
    }

    Ok(())
}

// ============ Shared pipeline ============

/// Acknowledgement body returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    fn ok(event_id: String) -> Self {
        Self {
            success: true,
            event_id: Some(event_id),
            message: None,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            event_id: None,
            message: Some(message.to_string()),
        }
    }
}

/// Shared webhook pipeline: verify, parse, apply.
///
/// Status contract: signature failures (including a missing configured
/// secret) reject with 401. Everything after verification is accept-and-log -
/// the provider always gets a 200 so it does not retry-storm us, and failed
/// applications are parked as dead letters for the sweep.
pub async fn handle_webhook<P: WebhookProvider>(
    provider: &P,
    state: &AppState,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let name = provider.provider_name();

    let Some(secret) = state.secret_for(name) else {
        tracing::warn!("{} webhook rejected: no webhook secret configured", name);
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookAck::failed("Webhook secret not configured")),
        );
    };

    if let Err(e) = provider.verify(&headers, &body, secret) {
        tracing::warn!("{} webhook rejected: {}", name, e);
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookAck::failed("Signature verification failed")),
        );
    }

    let event = match provider.parse(&headers, &body) {
        Ok(e) => e,
        Err(e) => {
            // Accept-and-log: a malformed body will never parse on retry, so
            // acknowledging it is the only way to stop redelivery.
            tracing::error!("Failed to parse {} webhook: {}", name, e);
            return (StatusCode::OK, Json(WebhookAck::failed("Invalid payload")));
        }
    };

    if matches!(event.action, EventAction::Ignored) {
        tracing::debug!(
            "{} event {} ignored (unhandled type {})",
            name,
            event.id,
            event.event_type
        );
        return (StatusCode::OK, Json(WebhookAck::ok(event.id)));
    }

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (
                StatusCode::OK,
                Json(WebhookAck::failed("Event accepted but not processed")),
            );
        }
    };

    match sync::apply_event(&mut conn, name, &event) {
        Ok(SyncOutcome::Duplicate) => {
            tracing::debug!("{} event {} already processed", name, event.id);
            (StatusCode::OK, Json(WebhookAck::ok(event.id)))
        }
        Ok(outcome) => {
            tracing::info!(
                "{} event {} applied: type={}, outcome={:?}",
                name,
                event.id,
                event.event_type,
                outcome
            );
            (StatusCode::OK, Json(WebhookAck::ok(event.id)))
        }
        Err(e) => {
            tracing::error!("Failed to apply {} event {}: {}", name, event.id, e);
            let body_text = String::from_utf8_lossy(&body);
            if let Err(dl_err) = queries::record_dead_letter(
                &conn,
                name,
                &event.id,
                &event.event_type,
                &body_text,
                &e.to_string(),
            ) {
                tracing::error!("Failed to record dead letter for {}: {}", event.id, dl_err);
            }
            (
                StatusCode::OK,
                Json(WebhookAck::failed("Event accepted but not processed")),
            )
        }
    }
}
