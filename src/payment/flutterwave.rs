//! Flutterwave payment gateway client
//!
//! The gateway is an untrusted, sometimes-slow, sometimes-failing network
//! peer. One configured client is built at process start and injected into
//! the engines that need it. Responses are decoded from the gateway's
//! loosely-typed JSON into narrow internal result types; anything that does
//! not map to a known success/failure shape fails with `MalformedPayload`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::error::PaymentError;

/// Every gateway call is bounded by this timeout; a timeout is a transient
/// failure, never a terminal one.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Charge initiation request.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub tx_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub customer_email: String,
    pub customer_name: String,
    pub redirect_url: String,
}

/// Hosted-payment session returned by a successful charge initiation.
#[derive(Debug, Clone)]
pub struct ChargeSession {
    pub payment_url: String,
}

/// Charge status as reported by the gateway. Only the recognized success
/// indicators complete a deposit; everything else is archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    Successful,
    Other(String),
}

impl ChargeStatus {
    /// Recognized success indicators across webhook and verify payloads.
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "successful" | "success" | "completed" | "charge.completed" => {
                ChargeStatus::Successful
            }
            other => ChargeStatus::Other(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChargeStatus::Successful)
    }
}

/// Narrow decode of a verification response.
#[derive(Debug, Clone)]
pub struct VerifiedCharge {
    pub status: ChargeStatus,
    pub gateway_tx_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

/// Funds transfer request.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub reference: String,
}

/// Receipt for a dispatched transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub transfer_id: String,
}

/// Payment gateway operations consumed by the engines.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a hosted charge; returns the payment URL the user is sent to.
    async fn initiate_charge(&self, req: &ChargeRequest)
    -> Result<ChargeSession, PaymentError>;

    /// Verify a charge by the gateway-issued transaction id.
    async fn verify(&self, gateway_tx_id: &str) -> Result<VerifiedCharge, PaymentError>;

    /// Verify a charge by our transaction reference. Fallback for deposits
    /// whose gateway id was never recorded.
    async fn verify_by_reference(&self, tx_ref: &str) -> Result<VerifiedCharge, PaymentError>;

    /// Dispatch a funds transfer to a bank account.
    async fn initiate_transfer(
        &self,
        req: &TransferRequest,
    ) -> Result<TransferReceipt, PaymentError>;
}

// --- Wire shapes (gateway JSON, everything optional) ---

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    id: Option<serde_json::Value>,
    tx_id: Option<serde_json::Value>,
    status: Option<String>,
    chargecode: Option<String>,
    amount: Option<Decimal>,
    charged_amount: Option<Decimal>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    id: Option<serde_json::Value>,
}

/// Render a JSON id field (number or string) as a string.
pub(crate) fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// HTTP client for the Flutterwave v3 API.
pub struct FlutterwaveClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl FlutterwaveClient {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            secret_key: secret_key.into(),
        }
    }

    async fn get_verify(&self, url: String) -> Result<VerifiedCharge, PaymentError> {
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::GatewayRejected(body));
        }

        let envelope: ApiEnvelope<VerifyData> = response.json().await?;
        let data = envelope
            .data
            .ok_or_else(|| PaymentError::MalformedPayload("verify response without data".into()))?;

        let status_raw = data
            .status
            .or(data.chargecode)
            .ok_or_else(|| PaymentError::MalformedPayload("verify response without status".into()))?;

        let gateway_tx_id = data
            .id
            .as_ref()
            .and_then(id_to_string)
            .or_else(|| data.tx_id.as_ref().and_then(id_to_string));

        Ok(VerifiedCharge {
            status: ChargeStatus::parse(&status_raw),
            gateway_tx_id,
            amount: data.amount.or(data.charged_amount),
            currency: data.currency,
        })
    }
}

#[async_trait]
impl PaymentGateway for FlutterwaveClient {
    async fn initiate_charge(
        &self,
        req: &ChargeRequest,
    ) -> Result<ChargeSession, PaymentError> {
        let payload = serde_json::json!({
            "tx_ref": req.tx_ref,
            "amount": req.amount.to_string(),
            "currency": req.currency,
            "redirect_url": req.redirect_url,
            "payment_options": req.payment_method,
            "customer": {
                "email": req.customer_email,
                "name": req.customer_name,
            },
            "customizations": {
                "title": "Daily Win",
                "description": format!("Deposit {} {}", req.currency, req.amount),
            },
        });

        let response = self
            .http
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::GatewayRejected(body));
        }

        let envelope: ApiEnvelope<ChargeData> = response.json().await?;
        let link = envelope
            .data
            .and_then(|d| d.link)
            .ok_or_else(|| PaymentError::GatewayRejected("no payment link returned".into()))?;

        Ok(ChargeSession { payment_url: link })
    }

    async fn verify(&self, gateway_tx_id: &str) -> Result<VerifiedCharge, PaymentError> {
        self.get_verify(format!(
            "{}/transactions/{}/verify",
            self.base_url, gateway_tx_id
        ))
        .await
    }

    async fn verify_by_reference(&self, tx_ref: &str) -> Result<VerifiedCharge, PaymentError> {
        self.get_verify(format!(
            "{}/transactions/verify_by_txref?tx_ref={}",
            self.base_url, tx_ref
        ))
        .await
    }

    async fn initiate_transfer(
        &self,
        req: &TransferRequest,
    ) -> Result<TransferReceipt, PaymentError> {
        let payload = serde_json::json!({
            "account_bank": req.bank_code,
            "account_number": req.account_number,
            "amount": req.amount.to_string(),
            "currency": req.currency,
            "beneficiary_name": req.account_name,
            "reference": req.reference,
            "narration": "Daily Win withdrawal",
            "debit_currency": req.currency,
        });

        let response = self
            .http
            .post(format!("{}/transfers", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let envelope: ApiEnvelope<TransferData> = response
                .json()
                .await
                .unwrap_or(ApiEnvelope {
                    message: None,
                    data: None,
                });
            return Err(PaymentError::GatewayRejected(
                envelope.message.unwrap_or_else(|| "Unknown error".into()),
            ));
        }

        let envelope: ApiEnvelope<TransferData> = response.json().await?;
        let transfer_id = envelope
            .data
            .and_then(|d| d.id.as_ref().and_then(id_to_string))
            // Missing transfer id means the transfer cannot be tracked;
            // the withdrawal engine treats this as a terminal rejection.
            .ok_or_else(|| PaymentError::GatewayRejected("no transfer id returned".into()))?;

        Ok(TransferReceipt { transfer_id })
    }
}
