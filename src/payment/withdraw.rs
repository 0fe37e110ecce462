//! Withdrawal eligibility & execution engine
//!
//! Eligibility is recomputed from the ledger on every request, never
//! cached. Execution claims the withdrawal with a status CAS immediately
//! before the gateway call, so two concurrent approvals can never dispatch
//! the same transfer twice. An ambiguous failure after dispatch leaves the
//! withdrawal `processing` — it is never silently reverted.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::balance::BalanceService;
use super::error::PaymentError;
use super::flutterwave::{PaymentGateway, TransferRequest};
use super::models::{
    LedgerEntryKind, NewLedgerEntry, NewWithdrawal, Withdrawal, WithdrawalStatus,
};
use super::store::LedgerStore;

/// Fixed minimum per withdrawal.
const MIN_WITHDRAWAL: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Fixed ceiling on the amounts a user may move per calendar day.
const DAILY_LIMIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Outcome of a transfer execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionReport {
    pub withdrawal_id: i64,
    pub status: WithdrawalStatus,
    pub gateway_transfer_id: Option<String>,
    pub ledger_entry_created: bool,
}

pub struct WithdrawService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    balances: BalanceService,
}

impl WithdrawService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        balances: BalanceService,
    ) -> Self {
        Self {
            store,
            gateway,
            balances,
        }
    }

    /// Check a requested amount against the current ledger-derived limits.
    ///
    /// Check order matters: the daily ceiling binds independently of
    /// balance, the minimum binds regardless of balance, and only then is
    /// the spendable balance consulted.
    pub async fn validate(&self, user_id: i64, amount: Decimal) -> Result<(), PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }

        let moved_today = self.balances.withdrawn_today(user_id).await?;
        if moved_today + amount > DAILY_LIMIT {
            return Err(PaymentError::DailyLimitExceeded {
                remaining: DAILY_LIMIT - moved_today,
            });
        }

        if amount < MIN_WITHDRAWAL {
            return Err(PaymentError::BelowMinimum {
                minimum: MIN_WITHDRAWAL,
            });
        }

        let summary = self.balances.summary(user_id).await?;
        if amount > summary.net_available {
            return Err(PaymentError::InsufficientFunds {
                available: summary.net_available,
            });
        }

        Ok(())
    }

    /// Create a pending withdrawal after eligibility validation. Execution
    /// waits for the administrative approval step.
    pub async fn request(&self, new: NewWithdrawal) -> Result<Withdrawal, PaymentError> {
        self.validate(new.user_id, new.amount).await?;

        let withdrawal = self.store.insert_withdrawal(new).await?;
        info!(
            withdrawal_id = withdrawal.withdrawal_id,
            user_id = withdrawal.user_id,
            amount = %withdrawal.amount,
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Pending requests awaiting approval, oldest first.
    pub async fn pending(&self) -> Result<Vec<Withdrawal>, PaymentError> {
        self.store.pending_withdrawals().await
    }

    /// Drive the gateway transfer for an approved withdrawal.
    ///
    /// The CAS claim `pending -> processing` is the mandatory status check
    /// immediately before the gateway call: a concurrent second execution
    /// loses the claim and stops without a second transfer.
    pub async fn execute(&self, withdrawal_id: i64) -> Result<ExecutionReport, PaymentError> {
        let withdrawal = self
            .store
            .withdrawal_by_id(withdrawal_id)
            .await?
            .ok_or(PaymentError::WithdrawalNotFound)?;

        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(PaymentError::InvalidState(format!(
                "Withdrawal is {}, not pending",
                withdrawal.status
            )));
        }

        let claimed = self
            .store
            .advance_withdrawal(
                withdrawal_id,
                WithdrawalStatus::Pending,
                WithdrawalStatus::Processing,
            )
            .await?;
        if !claimed {
            return Err(PaymentError::InvalidState(
                "Withdrawal was executed concurrently".to_string(),
            ));
        }

        let transfer = TransferRequest {
            bank_code: withdrawal.bank_code.clone(),
            account_number: withdrawal.account_number.clone(),
            account_name: withdrawal.account_name.clone(),
            amount: withdrawal.amount,
            currency: withdrawal.currency.clone(),
            reference: format!(
                "WDR_{}_{}_{}",
                withdrawal.withdrawal_id,
                Utc::now().timestamp_millis(),
                &Uuid::new_v4().simple().to_string()[..8]
            ),
        };

        let receipt = match self.gateway.initiate_transfer(&transfer).await {
            Ok(receipt) => receipt,
            Err(err @ PaymentError::GatewayRejected(_)) => {
                // Terminal: the gateway refused the transfer (or returned
                // no transfer id). No funds moved, no ledger entry.
                let failed = self
                    .store
                    .advance_withdrawal(
                        withdrawal_id,
                        WithdrawalStatus::Processing,
                        WithdrawalStatus::Failed,
                    )
                    .await?;
                if !failed {
                    error!(withdrawal_id, "Failed to mark rejected transfer as failed");
                }
                return Err(err);
            }
            Err(err) => {
                // Ambiguous: the transfer may or may not have been
                // dispatched. The withdrawal stays processing and waits
                // for manual reconciliation.
                warn!(
                    withdrawal_id,
                    %err,
                    "Transfer outcome unknown; withdrawal left processing"
                );
                return Err(err);
            }
        };

        self.store
            .set_withdrawal_transfer(withdrawal_id, &receipt.transfer_id)
            .await?;

        let ledger_entry_created = match self.ensure_withdrawal_entry(&withdrawal).await {
            Ok(created) => created,
            Err(err) => {
                error!(
                    withdrawal_id,
                    %err,
                    "Ledger entry write failed for dispatched withdrawal"
                );
                false
            }
        };

        info!(
            withdrawal_id,
            transfer_id = %receipt.transfer_id,
            "Withdrawal transfer dispatched"
        );

        Ok(ExecutionReport {
            withdrawal_id,
            status: WithdrawalStatus::Processing,
            gateway_transfer_id: Some(receipt.transfer_id),
            ledger_entry_created,
        })
    }

    /// Administrative rejection. Only legal while pending; no ledger
    /// effect.
    pub async fn reject(
        &self,
        withdrawal_id: i64,
        reason: &str,
    ) -> Result<Withdrawal, PaymentError> {
        let rejected = self
            .store
            .advance_withdrawal(
                withdrawal_id,
                WithdrawalStatus::Pending,
                WithdrawalStatus::Rejected,
            )
            .await?;

        if !rejected {
            let current = self
                .store
                .withdrawal_by_id(withdrawal_id)
                .await?
                .ok_or(PaymentError::WithdrawalNotFound)?;
            return Err(PaymentError::InvalidState(format!(
                "Withdrawal is {}, not pending",
                current.status
            )));
        }

        info!(withdrawal_id, reason, "Withdrawal rejected");

        self.store
            .withdrawal_by_id(withdrawal_id)
            .await?
            .ok_or(PaymentError::WithdrawalNotFound)
    }

    /// Create the withdrawal's ledger entry unless one already exists in
    /// the window starting at the withdrawal's creation.
    async fn ensure_withdrawal_entry(
        &self,
        withdrawal: &Withdrawal,
    ) -> Result<bool, PaymentError> {
        let exists = self
            .store
            .has_entry_since(
                withdrawal.user_id,
                LedgerEntryKind::Withdrawal,
                withdrawal.amount,
                withdrawal.created_at,
            )
            .await?;
        if exists {
            return Ok(false);
        }

        self.store
            .insert_entry(NewLedgerEntry {
                user_id: withdrawal.user_id,
                kind: LedgerEntryKind::Withdrawal,
                amount: withdrawal.amount,
                currency: withdrawal.currency.clone(),
                status: WithdrawalStatus::Processing.as_str().to_string(),
                description: format!("Withdrawal to {}", withdrawal.account_number),
            })
            .await?;
        Ok(true)
    }
}
