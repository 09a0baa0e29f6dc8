//! WorkOS webhook adapter.
//!
//! Signature scheme: a single `workos-signature` header of the form
//! `t=<unix_seconds>,v1=<hex_hmac>` where the digest is HMAC-SHA256 over
//! `"{t}.{body}"`. Payload envelope: `{id, event, data, created_at}`.

use axum::http::HeaderMap;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::models::{CreateOrganization, UpsertUser};

use super::{check_timestamp_tolerance, hmac_sha256, EventAction, WebhookEvent, WebhookProvider};

pub struct WorkosProvider;

const SIGNATURE_HEADER: &str = "workos-signature";

/// Parsed `t=...,v1=...` header segments.
#[derive(Debug)]
struct SignatureParts {
    timestamp: i64,
    signature: Vec<u8>,
}

fn parse_signature_header(header: &str) -> Result<SignatureParts> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<Vec<u8>> = None;

    for segment in header.split(',') {
        let Some((key, value)) = segment.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse()
                        .map_err(|_| AppError::MalformedSignature("Invalid timestamp"))?,
                );
            }
            "v1" => {
                signature = Some(
                    hex::decode(value)
                        .map_err(|_| AppError::MalformedSignature("Invalid hex signature"))?,
                );
            }
            _ => {}
        }
    }

    Ok(SignatureParts {
        timestamp: timestamp.ok_or(AppError::MalformedSignature("Missing timestamp segment"))?,
        signature: signature.ok_or(AppError::MalformedSignature("Missing signature segment"))?,
    })
}

// ============ Payload shapes ============

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    event: String,
    data: serde_json::Value,
    created_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    email: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    primary_email_address_id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    #[serde(alias = "profile_picture_url", alias = "image_url")]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    id: String,
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    id: String,
    name: String,
    #[serde(alias = "created_by_user_id")]
    created_by: Option<String>,
}

impl UserData {
    /// Some tenants deliver a flat `email`, others the address-list shape
    /// with a primary pointer. Prefer the flat field when present.
    fn primary_email(&self) -> Option<String> {
        if let Some(ref email) = self.email {
            return Some(email.clone());
        }
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|e| e.id == primary_id)
            .map(|e| e.email_address.clone())
    }

    fn full_name(&self) -> Option<String> {
        let name = match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => return None,
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    fn into_upsert(self) -> UpsertUser {
        UpsertUser {
            email: self.primary_email(),
            name: self.full_name(),
            avatar_url: self.avatar_url.clone(),
            external_id: self.id,
        }
    }
}

/// Event times arrive as RFC 3339 strings or raw Unix seconds depending on
/// the event family. Absent or unreadable times fall back to now, which makes
/// the delivery a last-writer win.
fn coerce_occurred_at(value: Option<&serde_json::Value>) -> i64 {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        Some(serde_json::Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|_| chrono::Utc::now().timestamp()),
        _ => chrono::Utc::now().timestamp(),
    }
}

impl WebhookProvider for WorkosProvider {
    fn provider_name(&self) -> &'static str {
        "workos"
    }

    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> Result<()> {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::MalformedSignature("Missing signature header"))?;

        let parts = parse_signature_header(header)?;
        check_timestamp_tolerance(self.provider_name(), parts.timestamp)?;

        let mut message = Vec::with_capacity(24 + body.len());
        message.extend_from_slice(parts.timestamp.to_string().as_bytes());
        message.push(b'.');
        message.extend_from_slice(body);

        let expected = hmac_sha256(secret.as_bytes(), &message)?;
        if expected.ct_eq(&parts.signature).into() {
            Ok(())
        } else {
            Err(AppError::SignatureInvalid)
        }
    }

    fn parse(&self, _headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidPayload(format!("Invalid event envelope: {}", e)))?;

        let occurred_at = coerce_occurred_at(envelope.created_at.as_ref());

        let action = match envelope.event.as_str() {
            "user.created" | "user.updated" => {
                let data: UserData = serde_json::from_value(envelope.data)
                    .map_err(|e| AppError::InvalidPayload(format!("Invalid user data: {}", e)))?;
                EventAction::UserUpserted(data.into_upsert())
            }
            "user.deleted" => {
                let data: UserData = serde_json::from_value(envelope.data)
                    .map_err(|e| AppError::InvalidPayload(format!("Invalid user data: {}", e)))?;
                EventAction::UserDeleted {
                    external_id: data.id,
                }
            }
            "organization.created" => {
                let data: OrganizationData = serde_json::from_value(envelope.data).map_err(|e| {
                    AppError::InvalidPayload(format!("Invalid organization data: {}", e))
                })?;
                EventAction::OrganizationCreated(CreateOrganization {
                    external_id: data.id,
                    name: data.name,
                    created_by: data.created_by,
                })
            }
            _ => EventAction::Ignored,
        };

        Ok(WebhookEvent {
            id: envelope.id,
            event_type: envelope.event,
            occurred_at,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_composite_signature_header() {
        let parts = parse_signature_header("t=1700000000,v1=deadbeef").unwrap();
        assert_eq!(parts.timestamp, 1700000000);
        assert_eq!(parts.signature, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_header_missing_signature_segment() {
        let err = parse_signature_header("t=1700000000").unwrap_err();
        assert!(matches!(err, AppError::MalformedSignature(_)));
    }

    #[test]
    fn rejects_header_missing_timestamp_segment() {
        let err = parse_signature_header("v1=deadbeef").unwrap_err();
        assert!(matches!(err, AppError::MalformedSignature(_)));
    }

    #[test]
    fn rejects_non_hex_signature() {
        let err = parse_signature_header("t=1700000000,v1=not-hex").unwrap_err();
        assert!(matches!(err, AppError::MalformedSignature(_)));
    }

    #[test]
    fn primary_email_resolves_from_address_list() {
        let data: UserData = serde_json::from_value(serde_json::json!({
            "id": "usr_1",
            "email_addresses": [
                {"id": "e1", "email_address": "a@b.com"},
                {"id": "e2", "email_address": "other@b.com"}
            ],
            "primary_email_address_id": "e1"
        }))
        .unwrap();
        assert_eq!(data.primary_email().as_deref(), Some("a@b.com"));
    }

    #[test]
    fn flat_email_wins_over_address_list() {
        let data: UserData = serde_json::from_value(serde_json::json!({
            "id": "usr_1",
            "email": "flat@b.com",
            "email_addresses": [{"id": "e1", "email_address": "a@b.com"}],
            "primary_email_address_id": "e1"
        }))
        .unwrap();
        assert_eq!(data.primary_email().as_deref(), Some("flat@b.com"));
    }

    #[test]
    fn full_name_joins_and_handles_missing_parts() {
        let full: UserData = serde_json::from_value(serde_json::json!({
            "id": "u", "first_name": "A", "last_name": "B"
        }))
        .unwrap();
        assert_eq!(full.full_name().as_deref(), Some("A B"));

        let first_only: UserData = serde_json::from_value(serde_json::json!({
            "id": "u", "first_name": "A"
        }))
        .unwrap();
        assert_eq!(first_only.full_name().as_deref(), Some("A"));

        let neither: UserData =
            serde_json::from_value(serde_json::json!({ "id": "u" })).unwrap();
        assert_eq!(neither.full_name(), None);
    }

    #[test]
    fn coerces_rfc3339_and_unix_event_times() {
        let unix = coerce_occurred_at(Some(&serde_json::json!(1700000000)));
        assert_eq!(unix, 1700000000);

        let rfc = coerce_occurred_at(Some(&serde_json::json!("2023-11-14T22:13:20Z")));
        assert_eq!(rfc, 1700000000);
    }

    #[test]
    fn unknown_event_type_parses_to_ignored() {
        let body = serde_json::json!({
            "id": "evt_x",
            "event": "session.created",
            "data": {},
            "created_at": 1700000000
        })
        .to_string();
        let event = WorkosProvider
            .parse(&HeaderMap::new(), body.as_bytes())
            .unwrap();
        assert_eq!(event.action, EventAction::Ignored);
        assert_eq!(event.event_type, "session.created");
    }
}
