//! Payment HTTP handlers
//!
//! Thin axum handlers over the engines: extraction, DTO mapping and the
//! single PaymentError -> HTTP mapping live here; all ledger logic stays
//! in the services.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::{
    state::AppState,
    types::{ApiResponse, error_codes},
};
use crate::user_auth::Claims;

use super::deposit::{CompletionOutcome, DepositInitiation, ReconcileSummary};
use super::error::PaymentError;
use super::models::{JackpotSnapshot, LedgerEntry, NewWithdrawal, Withdrawal};
use super::webhook::WebhookDisposition;
use super::withdraw::ExecutionReport;

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

/// Single place mapping engine errors to HTTP responses.
fn error_response(err: PaymentError) -> HandlerError {
    use PaymentError::*;

    let (status, code) = match &err {
        InvalidSignature => (StatusCode::UNAUTHORIZED, error_codes::INVALID_SIGNATURE),
        MalformedPayload(_) | InvalidAmount | AboveMaximum { .. } => {
            (StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER)
        }
        InsufficientFunds { .. } => (StatusCode::BAD_REQUEST, error_codes::INSUFFICIENT_BALANCE),
        BelowMinimum { .. } => (StatusCode::BAD_REQUEST, error_codes::BELOW_MINIMUM),
        DailyLimitExceeded { .. } => {
            (StatusCode::BAD_REQUEST, error_codes::DAILY_LIMIT_EXCEEDED)
        }
        DepositNotFound | WithdrawalNotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
        InvalidState(_) => (StatusCode::BAD_REQUEST, error_codes::INVALID_STATE),
        GatewayRejected(_) => (StatusCode::BAD_GATEWAY, error_codes::GATEWAY_ERROR),
        GatewayTimeout | GatewayUnavailable(_) => {
            (StatusCode::GATEWAY_TIMEOUT, error_codes::GATEWAY_ERROR)
        }
        Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
    };

    (status, Json(ApiResponse::<()>::error(code, err.to_string())))
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct InitiateDepositRequest {
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub payment_method: String,
    pub customer_email: String,
    pub customer_name: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequestBody {
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct VerifyDepositResponse {
    pub deposit_id: i64,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PendingWithdrawalsResponse {
    pub pending_withdrawals: Vec<Withdrawal>,
}

// --- Handlers ---

/// POST /api/v1/payments/webhook
///
/// Raw body + signature header. Any syntactically valid, authenticated
/// event is acknowledged (including non-success and unknown-reference
/// events) so the gateway stops redelivering.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<()>>, HandlerError> {
    let signature = headers
        .get("verif-hash")
        .or_else(|| headers.get("x-flutterwave-signature"))
        .and_then(|v| v.to_str().ok());

    let disposition = state
        .webhooks
        .ingest(&body, signature)
        .await
        .map_err(error_response)?;

    let msg = match disposition {
        WebhookDisposition::Reconciled(CompletionOutcome::Completed { .. }) => {
            "Processed deposit webhook"
        }
        WebhookDisposition::Reconciled(CompletionOutcome::AlreadyCompleted) => {
            "Duplicate event ignored"
        }
        WebhookDisposition::IgnoredNonSuccess => "Ignored non-successful webhook event",
        WebhookDisposition::NoMatchingDeposit => "No matching deposit found; event stored",
    };

    Ok(Json(ApiResponse::success_msg((), msg)))
}

/// POST /api/v1/payments/deposit/initiate
pub async fn initiate_deposit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InitiateDepositRequest>,
) -> Result<Json<ApiResponse<DepositInitiation>>, HandlerError> {
    let initiation = state
        .deposits
        .initiate(
            claims.user_id(),
            req.amount,
            &req.currency,
            &req.payment_method,
            &req.customer_email,
            &req.customer_name,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(initiation)))
}

/// GET /api/v1/payments/deposit/{deposit_id}/verify
pub async fn verify_deposit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(deposit_id): Path<i64>,
) -> Result<Json<ApiResponse<VerifyDepositResponse>>, HandlerError> {
    let report = state
        .deposits
        .verify_deposit(claims.user_id(), deposit_id)
        .await
        .map_err(error_response)?;

    let message = match &report.outcome {
        Some(CompletionOutcome::Completed { .. }) => "Deposit completed",
        Some(CompletionOutcome::AlreadyCompleted) => "Deposit already completed",
        None => "Deposit not yet confirmed by the gateway",
    };

    Ok(Json(ApiResponse::success(VerifyDepositResponse {
        deposit_id: report.deposit_id,
        status: report.status.to_string(),
        message: message.to_string(),
    })))
}

/// GET /api/v1/payments/balance
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<super::balance::BalanceSummary>>, HandlerError> {
    let summary = state
        .balances
        .summary(claims.user_id())
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/v1/payments/transactions
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<LedgerEntry>>>, HandlerError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let entries = state
        .deposits
        .store()
        .entries_for_user(claims.user_id(), limit)
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(entries)))
}

/// POST /api/v1/payments/withdraw
pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<WithdrawRequestBody>,
) -> Result<Json<ApiResponse<Withdrawal>>, HandlerError> {
    let withdrawal = state
        .withdrawals
        .request(NewWithdrawal {
            user_id: claims.user_id(),
            amount: req.amount,
            currency: req.currency,
            bank_code: req.bank_code,
            account_number: req.account_number,
            account_name: req.account_name,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(withdrawal)))
}

/// GET /api/v1/jackpot
pub async fn get_jackpot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<JackpotSnapshot>>, HandlerError> {
    let snapshot = state.balances.jackpot().await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// GET /api/v1/admin/withdrawals/pending
pub async fn list_pending_withdrawals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<PendingWithdrawalsResponse>>, HandlerError> {
    let pending = state.withdrawals.pending().await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(PendingWithdrawalsResponse {
        pending_withdrawals: pending,
    })))
}

/// POST /api/v1/admin/withdrawals/{withdrawal_id}/approve
pub async fn approve_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(withdrawal_id): Path<i64>,
) -> Result<Json<ApiResponse<ExecutionReport>>, HandlerError> {
    let report = state
        .withdrawals
        .execute(withdrawal_id)
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(report)))
}

/// POST /api/v1/admin/withdrawals/{withdrawal_id}/reject
pub async fn reject_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(withdrawal_id): Path<i64>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ApiResponse<Withdrawal>>, HandlerError> {
    let withdrawal = state
        .withdrawals
        .reject(withdrawal_id, &req.reason)
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(withdrawal)))
}

/// POST /api/v1/admin/reconcile
///
/// Batch verification of pending deposits plus the missing-entry repair
/// scan.
pub async fn run_reconciliation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<ReconcileSummary>>, HandlerError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let summary = state
        .deposits
        .reconcile_pending(limit)
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/v1/health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<&'static str>>, HandlerError> {
    state.db.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::error(
                error_codes::SERVICE_UNAVAILABLE,
                e.to_string(),
            )),
        )
    })?;

    Ok(Json(ApiResponse::success("ok")))
}
