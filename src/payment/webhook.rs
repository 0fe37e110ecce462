//! Webhook ingestion
//!
//! Authenticates and deduplicates inbound gateway notifications. The
//! signature check runs against the exact raw body bytes before any
//! parsing of semantic content, so a forged payload can never drive a
//! state transition. Authenticated events that do not complete a deposit
//! (non-success status, unknown reference) are archived for forensic
//! replay and acknowledged, which stops redelivery storms.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use super::deposit::{CompletionOutcome, DepositService};
use super::error::PaymentError;
use super::flutterwave::{ChargeStatus, id_to_string};

type HmacSha256 = Hmac<Sha256>;

/// Verifies webhook signatures with the shared secret. No shared mutable
/// state.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Constant-time check of the hex HMAC-SHA256 signature over the raw
    /// body bytes.
    pub fn verify(&self, raw_body: &[u8], signature: &str) -> Result<(), PaymentError> {
        let provided =
            hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| PaymentError::InvalidSignature)?;
        mac.update(raw_body);
        mac.verify_slice(&provided)
            .map_err(|_| PaymentError::InvalidSignature)
    }
}

// --- Gateway event wire shapes (everything optional) ---

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event: Option<String>,
    data: Option<EventData>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    status: Option<String>,
    tx_ref: Option<String>,
    reference: Option<String>,
    flw_ref: Option<String>,
    id: Option<serde_json::Value>,
    tx_id: Option<serde_json::Value>,
}

/// What happened to an authenticated webhook delivery. Every variant is
/// acknowledged with success to the gateway; only authentication and
/// malformed-payload failures surface as errors.
#[derive(Debug)]
pub enum WebhookDisposition {
    /// A deposit completion was applied (or observed already applied).
    Reconciled(CompletionOutcome),
    /// Recognized event, but not a success status. Archived.
    IgnoredNonSuccess,
    /// Success event for a reference we do not track. Archived; a deposit
    /// is never fabricated from a webhook.
    NoMatchingDeposit,
}

pub struct WebhookIngestor {
    verifier: SignatureVerifier,
    deposits: Arc<DepositService>,
}

impl WebhookIngestor {
    pub fn new(verifier: SignatureVerifier, deposits: Arc<DepositService>) -> Self {
        Self { verifier, deposits }
    }

    /// Process one delivery: authenticate, parse, archive or hand off to
    /// the reconciliation engine.
    pub async fn ingest(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookDisposition, PaymentError> {
        // 1. Authenticate before touching the payload.
        let signature = signature.ok_or(PaymentError::InvalidSignature)?;
        self.verifier.verify(raw_body, signature)?;

        // 2. Parse the envelope.
        let payload: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;
        let envelope: EventEnvelope = serde_json::from_value(payload.clone())
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;

        // 3. Only recognized success indicators advance a deposit.
        let status_raw = envelope
            .data
            .as_ref()
            .and_then(|d| d.status.clone())
            .or(envelope.event.clone());
        let is_success = status_raw
            .as_deref()
            .map(|s| ChargeStatus::parse(s).is_success())
            .unwrap_or(false);

        if !is_success {
            self.deposits.archive_event(&payload).await?;
            info!(status = ?status_raw, "Ignored non-successful webhook event");
            return Ok(WebhookDisposition::IgnoredNonSuccess);
        }

        let data = envelope
            .data
            .ok_or_else(|| PaymentError::MalformedPayload("event without data".into()))?;

        // 4. A success event must carry a transaction reference.
        let tx_ref = data
            .tx_ref
            .or(data.reference)
            .or(data.flw_ref.clone())
            .ok_or_else(|| PaymentError::MalformedPayload("tx_ref missing in payload".into()))?;

        let gateway_tx_id = data
            .id
            .as_ref()
            .and_then(id_to_string)
            .or_else(|| data.tx_id.as_ref().and_then(id_to_string))
            .or(data.flw_ref);

        // 5. Match against our ledger; foreign references are archived,
        // never turned into deposits.
        let deposit = match self.deposits.find_by_reference(&tx_ref).await? {
            Some(deposit) => deposit,
            None => {
                self.deposits.archive_event(&payload).await?;
                warn!(%tx_ref, "Webhook for unknown deposit reference; event stored");
                return Ok(WebhookDisposition::NoMatchingDeposit);
            }
        };

        // 6. Hand off to the reconciliation engine.
        let gateway_tx_id = gateway_tx_id.unwrap_or_else(|| deposit.tx_ref.clone());
        let outcome = self.deposits.apply_completion(&deposit, &gateway_tx_id).await?;

        Ok(WebhookDisposition::Reconciled(outcome))
    }
}
