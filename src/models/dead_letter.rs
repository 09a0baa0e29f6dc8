use serde::Serialize;

/// A webhook event that verified but failed to apply.
///
/// Deliveries past the signature stage are always acknowledged with a 200, so
/// the provider never retries them. Failed applications land here instead and
/// are retried by the out-of-band sweep.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub id: String,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    /// Raw request body as received, so the sweep can re-parse and re-apply.
    pub payload: String,
    pub error: String,
    pub attempts: i64,
    pub failed_at: i64,
    pub resolved_at: Option<i64>,
}
