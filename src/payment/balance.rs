//! Balance accounting engine
//!
//! Pure derivation of a user's balance figures from the relational ledger.
//! No external calls; always consistent with whatever the ledger currently
//! holds. `processing` withdrawals count as already-debited (funds in
//! flight must not be spendable again); `pending` withdrawals only reduce
//! `net_available`, so a dashboard can show not-yet-committed funds
//! separately.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;

use super::error::PaymentError;
use super::models::{JackpotSnapshot, WithdrawalStatus};
use super::store::LedgerStore;
use crate::cache::{BalanceCache, CachedBalance};

/// The five derived balance figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub available_balance: Decimal,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub pending_withdrawals: Decimal,
    pub net_available: Decimal,
}

impl BalanceSummary {
    /// Derive the figures from the three ledger sums.
    pub fn derive(
        total_deposits: Decimal,
        total_withdrawals: Decimal,
        pending_withdrawals: Decimal,
    ) -> Self {
        let available_balance = total_deposits - total_withdrawals;
        Self {
            available_balance,
            total_deposits,
            total_withdrawals,
            pending_withdrawals,
            net_available: available_balance - pending_withdrawals,
        }
    }
}

/// Withdrawal statuses that count as already-debited.
const COMMITTED: [WithdrawalStatus; 2] =
    [WithdrawalStatus::Completed, WithdrawalStatus::Processing];

#[derive(Clone)]
pub struct BalanceService {
    store: Arc<dyn LedgerStore>,
}

impl BalanceService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Compute the user's balance figures from the ledger.
    pub async fn summary(&self, user_id: i64) -> Result<BalanceSummary, PaymentError> {
        let total_deposits = self.store.sum_completed_deposits(user_id).await?;
        let total_withdrawals = self
            .store
            .sum_withdrawals(user_id, &COMMITTED, None)
            .await?;
        let pending_withdrawals = self
            .store
            .sum_withdrawals(user_id, &[WithdrawalStatus::Pending], None)
            .await?;

        Ok(BalanceSummary::derive(
            total_deposits,
            total_withdrawals,
            pending_withdrawals,
        ))
    }

    /// Sum of the user's withdrawals created since midnight UTC, in the
    /// statuses that count against the daily ceiling.
    pub async fn withdrawn_today(&self, user_id: i64) -> Result<Decimal, PaymentError> {
        let day_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();

        self.store
            .sum_withdrawals(
                user_id,
                &[
                    WithdrawalStatus::Pending,
                    WithdrawalStatus::Processing,
                    WithdrawalStatus::Completed,
                ],
                Some(day_start),
            )
            .await
    }

    /// Jackpot aggregate: sum over all completed deposits, recomputed on
    /// read and persisted as a cached scalar.
    pub async fn jackpot(&self) -> Result<JackpotSnapshot, PaymentError> {
        let current_amount = self.store.sum_all_completed_deposits().await?;
        let updated_at = Utc::now();
        self.store.upsert_jackpot(current_amount, updated_at).await?;

        Ok(JackpotSnapshot {
            current_amount,
            currency: "USD".to_string(),
            updated_at,
        })
    }
}

/// Rebuild a user's cached snapshot by replaying the ledger-derived
/// summary. The only mechanism that eliminates drift.
pub async fn rebuild_user_cache(
    balances: &BalanceService,
    cache: &dyn BalanceCache,
    user_id: i64,
) -> Result<(), PaymentError> {
    let summary = balances.summary(user_id).await?;
    let snapshot = CachedBalance {
        user_id,
        available_balance: summary.available_balance.to_f64().unwrap_or(0.0),
        total_deposits: summary.total_deposits.to_f64().unwrap_or(0.0),
    };

    if let Err(reason) = cache.replace(snapshot).await {
        tracing::warn!(user_id, %reason, "Cache rebuild failed");
    }
    Ok(())
}
