//! # Stripe Webhook Verification
//!
//! Stripe signs each delivery with `Stripe-Signature: t=<unix>,v1=<hex>`,
//! where `v1` is HMAC-SHA256 over `"<t>.<raw body>"` keyed by the endpoint's
//! signing secret.

use hmac::{Hmac, Mac};
use pay_core::{CardEvent, CardEventKind, CommerceError, CommerceResult, PaymentIntent};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Events that should be enabled on the Stripe webhook endpoint
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] =
    &["payment_intent.succeeded", "payment_intent.payment_failed"];

fn rejected(reason: impl Into<String>) -> CommerceError {
    CommerceError::WebhookVerificationFailed {
        reason: reason.into(),
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> CommerceResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| rejected("Missing timestamp in signature"))?;
    if signatures.is_empty() {
        return Err(rejected("No v1 signature found"));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn keyed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> CommerceResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CommerceError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// `Stripe-Signature` value for `payload` signed at `timestamp`
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> CommerceResult<String> {
    let mac = keyed_mac(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify `header` against the raw body and parse the event.
///
/// `now` is the current unix time; deliveries signed more than
/// `tolerance_secs` away from it are rejected.
pub fn verify_event(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
    tolerance_secs: i64,
) -> CommerceResult<CardEvent> {
    let parsed = parse_signature_header(header)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(rejected("Timestamp outside tolerance"));
    }

    let mac = keyed_mac(secret, parsed.timestamp, payload)?;
    let valid = parsed.signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !valid {
        return Err(rejected("Signature mismatch"));
    }

    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| rejected(format!("Failed to parse webhook: {}", e)))?;
    debug!(event_id = %event.id, event_type = %event.event_type, "Verified Stripe webhook");

    let intent = match event.data.object.get("object").and_then(|v| v.as_str()) {
        Some("payment_intent") => {
            serde_json::from_value::<PaymentIntent>(serde_json::Value::Object(event.data.object))
                .ok()
        }
        _ => None,
    };

    Ok(CardEvent {
        id: event.id,
        kind: CardEventKind::from_type(&event.event_type),
        intent,
    })
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}
