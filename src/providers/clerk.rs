//! Clerk webhook adapter.
//!
//! Clerk delivers through Svix, so the signature spans three headers:
//! `svix-id`, `svix-timestamp`, and `svix-signature`. The signed content is
//! `"{id}.{timestamp}.{body}"`, the secret is base64 behind a `whsec_`
//! prefix, and the signature header carries one or more space-separated
//! `v1,<base64>` candidates (rotation windows produce more than one).
//! The envelope is `{type, data, timestamp}` with the event id living in the
//! `svix-id` header rather than the body.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::models::{CreateOrganization, UpsertUser};

use super::{check_timestamp_tolerance, hmac_sha256, EventAction, WebhookEvent, WebhookProvider};

pub struct ClerkProvider;

const ID_HEADER: &str = "svix-id";
const TIMESTAMP_HEADER: &str = "svix-timestamp";
const SIGNATURE_HEADER: &str = "svix-signature";

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MalformedSignature("Missing svix header"))
}

/// Decode a `whsec_`-prefixed base64 signing secret into raw key bytes.
fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
    BASE64
        .decode(encoded)
        .map_err(|_| AppError::MalformedSignature("Invalid webhook secret encoding"))
}

impl WebhookProvider for ClerkProvider {
    fn provider_name(&self) -> &'static str {
        "clerk"
    }

    fn verify(&self, headers: &HeaderMap, body: &[u8], secret: &str) -> Result<()> {
        let msg_id = header_str(headers, ID_HEADER)?;
        let timestamp_raw = header_str(headers, TIMESTAMP_HEADER)?;
        let signatures = header_str(headers, SIGNATURE_HEADER)?;

        let timestamp: i64 = timestamp_raw
            .parse()
            .map_err(|_| AppError::MalformedSignature("Invalid timestamp"))?;
        check_timestamp_tolerance(self.provider_name(), timestamp)?;

        let key = decode_secret(secret)?;

        let mut message = Vec::with_capacity(msg_id.len() + timestamp_raw.len() + body.len() + 2);
        message.extend_from_slice(msg_id.as_bytes());
        message.push(b'.');
        message.extend_from_slice(timestamp_raw.as_bytes());
        message.push(b'.');
        message.extend_from_slice(body);

        let expected = hmac_sha256(&key, &message)?;

        for candidate in signatures.split(' ') {
            let Some((version, encoded)) = candidate.split_once(',') else {
                continue;
            };
            if version != "v1" {
                continue;
            }
            let Ok(decoded) = BASE64.decode(encoded) else {
                continue;
            };
            if expected.ct_eq(&decoded).into() {
                return Ok(());
            }
        }

        Err(AppError::SignatureInvalid)
    }

    fn parse(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent> {
        // The delivery id is the idempotency key; Clerk retries reuse it.
        let event_id = header_str(headers, ID_HEADER)?.to_string();

        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidPayload(format!("Invalid event envelope: {}", e)))?;

        let occurred_at = normalize_timestamp(envelope.timestamp);

        let action = match envelope.event_type.as_str() {
            "user.created" | "user.updated" => {
                let data: UserData = serde_json::from_value(envelope.data)
                    .map_err(|e| AppError::InvalidPayload(format!("Invalid user data: {}", e)))?;
                EventAction::UserUpserted(data.into_upsert())
            }
            "user.deleted" => {
                let data: DeletedData = serde_json::from_value(envelope.data)
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
            id: event_id,
            event_type: envelope.event_type,
            occurred_at,
            action,
        })
    }
}

// ============ Payload shapes ============

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    primary_email_address_id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    id: String,
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct DeletedData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    id: String,
    name: String,
    created_by: Option<String>,
}

impl UserData {
    fn primary_email(&self) -> Option<String> {
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|e| e.id == primary_id)
            .map(|e| e.email_address.clone())
    }

    fn full_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.trim().is_empty() {
            None
        } else {
            Some(name.trim().to_string())
        }
    }

    fn into_upsert(self) -> UpsertUser {
        UpsertUser {
            email: self.primary_email(),
            name: self.full_name(),
            avatar_url: self.image_url.clone(),
            external_id: self.id,
        }
    }
}

/// Clerk sends the envelope timestamp in milliseconds. Tell the two apart by
/// magnitude; no Unix-seconds value crosses 1e12 until the year 33658.
fn normalize_timestamp(raw: Option<i64>) -> i64 {
    match raw {
        Some(ts) if ts > 1_000_000_000_000 => ts / 1000,
        Some(ts) => ts,
        None => chrono::Utc::now().timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_prefixed_and_bare_secrets() {
        let key = BASE64.encode(b"supersecret");
        assert_eq!(
            decode_secret(&format!("whsec_{}", key)).unwrap(),
            b"supersecret"
        );
        assert_eq!(decode_secret(&key).unwrap(), b"supersecret");
        assert!(decode_secret("whsec_!!!").is_err());
    }

    #[test]
    fn normalizes_millisecond_timestamps() {
        assert_eq!(normalize_timestamp(Some(1700000000)), 1700000000);
        assert_eq!(normalize_timestamp(Some(1700000000123)), 1700000000);
    }

    #[test]
    fn resolves_primary_email_from_address_list() {
        let data: UserData = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "email_addresses": [
                {"id": "idn_2", "email_address": "secondary@example.com"},
                {"id": "idn_1", "email_address": "primary@example.com"}
            ],
            "primary_email_address_id": "idn_1"
        }))
        .unwrap();
        assert_eq!(
            data.primary_email().as_deref(),
            Some("primary@example.com")
        );
    }

    #[test]
    fn missing_primary_pointer_yields_no_email() {
        let data: UserData = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "email_addresses": [{"id": "idn_1", "email_address": "a@example.com"}]
        }))
        .unwrap();
        assert_eq!(data.primary_email(), None);
    }

    #[test]
    fn event_id_comes_from_delivery_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ID_HEADER, "msg_123".parse().unwrap());
        let body = serde_json::json!({
            "type": "user.deleted",
            "data": {"id": "user_1", "deleted": true},
            "timestamp": 1700000000
        })
        .to_string();

        let event = ClerkProvider.parse(&headers, body.as_bytes()).unwrap();
        assert_eq!(event.id, "msg_123");
        assert_eq!(
            event.action,
            EventAction::UserDeleted {
                external_id: "user_1".to_string()
            }
        );
    }
}
