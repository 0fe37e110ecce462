use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the payment reconciliation and withdrawal engines.
///
/// Duplicate completion of a deposit is *not* an error — it is the
/// `CompletionOutcome::AlreadyCompleted` no-op.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Gateway call timed out")]
    GatewayTimeout,

    #[error("Gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Insufficient balance. Available: {available}")]
    InsufficientFunds { available: Decimal },

    #[error("Minimum withdrawal amount is {minimum}")]
    BelowMinimum { minimum: Decimal },

    #[error("Daily withdrawal limit exceeded. Remaining: {remaining}")]
    DailyLimitExceeded { remaining: Decimal },

    #[error("Deposit not found")]
    DepositNotFound,

    #[error("Withdrawal not found")]
    WithdrawalNotFound,

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Maximum deposit amount exceeded ({maximum})")]
    AboveMaximum { maximum: Decimal },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl PaymentError {
    /// Transient failures are safe to retry later without operator action;
    /// the underlying record stays in its current non-terminal state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PaymentError::GatewayUnavailable(_)
                | PaymentError::GatewayTimeout
                | PaymentError::Database(_)
        )
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::GatewayTimeout
        } else if err.is_decode() {
            PaymentError::MalformedPayload(err.to_string())
        } else {
            PaymentError::GatewayUnavailable(err.to_string())
        }
    }
}
