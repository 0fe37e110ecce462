//! Deposit reconciliation engine
//!
//! Advances a deposit from `pending` to `completed` (or `failed`) with
//! exactly-once ledger effects, no matter how many webhook deliveries and
//! verification polls race for the same record. The status CAS on the
//! deposit row is the only arbiter: the winner applies the ledger entry
//! and the cache mirror, every loser observes the already-completed state
//! and no-ops.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::PaymentError;
use super::flutterwave::{ChargeRequest, PaymentGateway, VerifiedCharge};
use super::models::{Deposit, DepositStatus, LedgerEntryKind, NewDeposit, NewLedgerEntry};
use super::store::LedgerStore;
use crate::cache::{BalanceCache, MirrorStatus, mirror_deposit_credit};

/// Upper bound on a single funding attempt.
const MAX_DEPOSIT: Decimal = Decimal::from_parts(50_000_000, 0, 0, false, 0);

/// Result of one completion attempt. Duplicates are no-ops, not errors.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// This attempt won the pending -> completed transition.
    Completed {
        ledger_entry_created: bool,
        cache: MirrorStatus,
    },
    /// A concurrent or earlier attempt already completed the deposit.
    AlreadyCompleted,
}

impl CompletionOutcome {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CompletionOutcome::Completed { .. })
    }
}

/// Response to a deposit initiation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DepositInitiation {
    pub deposit_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub status: DepositStatus,
    pub payment_url: String,
    pub tx_ref: String,
}

/// Current state of a deposit after a verification poll.
#[derive(Debug)]
pub struct VerificationReport {
    pub deposit_id: i64,
    pub status: DepositStatus,
    pub outcome: Option<CompletionOutcome>,
}

/// Summary of a batch reconciliation pass.
#[derive(Debug, Default, serde::Serialize)]
pub struct ReconcileSummary {
    pub examined: usize,
    pub completed: usize,
    pub repaired_entries: usize,
}

pub struct DepositService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<dyn BalanceCache>,
    redirect_url: String,
}

impl DepositService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<dyn BalanceCache>,
        redirect_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            cache,
            redirect_url,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Begin a funding attempt: create the pending row, then ask the
    /// gateway for a hosted payment session. A gateway rejection discards
    /// the never-started record; transient failures leave it pending for
    /// batch reconciliation.
    pub async fn initiate(
        &self,
        user_id: i64,
        amount: Decimal,
        currency: &str,
        payment_method: &str,
        customer_email: &str,
        customer_name: &str,
    ) -> Result<DepositInitiation, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        if amount > MAX_DEPOSIT {
            return Err(PaymentError::AboveMaximum {
                maximum: MAX_DEPOSIT,
            });
        }

        let tx_ref = format!(
            "DEP_{}_{}_{}",
            user_id,
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );

        let deposit = self
            .store
            .insert_deposit(NewDeposit {
                user_id,
                amount,
                currency: currency.to_string(),
                tx_ref: tx_ref.clone(),
                payment_method: payment_method.to_string(),
            })
            .await?;

        let charge = ChargeRequest {
            tx_ref: tx_ref.clone(),
            amount,
            currency: currency.to_string(),
            payment_method: payment_method.to_string(),
            customer_email: customer_email.to_string(),
            customer_name: customer_name.to_string(),
            redirect_url: format!("{}/payment-callback", self.redirect_url),
        };

        let session = match self.gateway.initiate_charge(&charge).await {
            Ok(session) => session,
            Err(err @ PaymentError::GatewayRejected(_)) => {
                // The charge never started; the initiation row is noise.
                self.store
                    .delete_deposit_initiation(deposit.deposit_id)
                    .await?;
                return Err(err);
            }
            Err(err) => {
                warn!(
                    deposit_id = deposit.deposit_id,
                    %err,
                    "Charge initiation failed transiently; deposit left pending"
                );
                return Err(err);
            }
        };

        info!(
            deposit_id = deposit.deposit_id,
            user_id, %amount, currency, "Deposit initiated"
        );

        Ok(DepositInitiation {
            deposit_id: deposit.deposit_id,
            amount: deposit.amount,
            currency: deposit.currency,
            status: deposit.status,
            payment_url: session.payment_url,
            tx_ref,
        })
    }

    /// Look up a deposit by its gateway reference (webhook entry point).
    pub async fn find_by_reference(
        &self,
        tx_ref: &str,
    ) -> Result<Option<Deposit>, PaymentError> {
        self.store.deposit_by_reference(tx_ref).await
    }

    /// Archive a gateway payload that did not map to a completion.
    pub async fn archive_event(&self, payload: &serde_json::Value) -> Result<(), PaymentError> {
        self.store.archive_webhook_event(payload).await
    }

    /// Poll-driven reconciliation: verify the deposit against the gateway
    /// and apply the completion if the gateway reports success.
    pub async fn verify_deposit(
        &self,
        user_id: i64,
        deposit_id: i64,
    ) -> Result<VerificationReport, PaymentError> {
        let deposit = self
            .store
            .deposit_by_id(deposit_id)
            .await?
            .filter(|d| d.user_id == user_id)
            .ok_or(PaymentError::DepositNotFound)?;

        if deposit.status == DepositStatus::Completed {
            return Ok(VerificationReport {
                deposit_id,
                status: DepositStatus::Completed,
                outcome: Some(CompletionOutcome::AlreadyCompleted),
            });
        }

        let verified = self.verify_remote(&deposit).await?;
        if !verified.status.is_success() {
            return Ok(VerificationReport {
                deposit_id,
                status: deposit.status,
                outcome: None,
            });
        }

        let gateway_tx_id = verified
            .gateway_tx_id
            .or_else(|| deposit.gateway_tx_id.clone())
            .unwrap_or_else(|| deposit.tx_ref.clone());

        let outcome = self.apply_completion(&deposit, &gateway_tx_id).await?;

        Ok(VerificationReport {
            deposit_id,
            status: DepositStatus::Completed,
            outcome: Some(outcome),
        })
    }

    /// Verify with the gateway, by transaction id first, falling back to
    /// the stored reference.
    async fn verify_remote(&self, deposit: &Deposit) -> Result<VerifiedCharge, PaymentError> {
        if let Some(gateway_tx_id) = &deposit.gateway_tx_id {
            match self.gateway.verify(gateway_tx_id).await {
                Ok(verified) => return Ok(verified),
                Err(err) => {
                    warn!(
                        deposit_id = deposit.deposit_id,
                        %err,
                        "Verify by id failed; falling back to reference"
                    );
                }
            }
        }
        self.gateway.verify_by_reference(&deposit.tx_ref).await
    }

    /// The exactly-once transition. Gateway notifications are delivered
    /// at-least-once and verification polls race webhook delivery, so the
    /// current status is re-checked atomically (CAS) immediately before
    /// mutating.
    pub async fn apply_completion(
        &self,
        deposit: &Deposit,
        gateway_tx_id: &str,
    ) -> Result<CompletionOutcome, PaymentError> {
        let won = self
            .store
            .complete_deposit(deposit.deposit_id, gateway_tx_id, Utc::now())
            .await?;

        if !won {
            info!(
                deposit_id = deposit.deposit_id,
                "Completion already applied; no-op"
            );
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        // The deposit row is committed as completed. The ledger entry and
        // the cache mirror are separate commits, each retryable on its own:
        // a failure here leaves a detectable anomaly for the repair scan,
        // never a rolled-back completion.
        let ledger_entry_created = match self.ensure_deposit_entry(deposit).await {
            Ok(created) => created,
            Err(err) => {
                error!(
                    deposit_id = deposit.deposit_id,
                    %err,
                    "Ledger entry write failed for completed deposit; repair scan will converge it"
                );
                false
            }
        };

        let cache = mirror_deposit_credit(self.cache.as_ref(), deposit.user_id, deposit.amount)
            .await;

        info!(
            deposit_id = deposit.deposit_id,
            user_id = deposit.user_id,
            amount = %deposit.amount,
            gateway_tx_id,
            "Deposit completed"
        );

        Ok(CompletionOutcome::Completed {
            ledger_entry_created,
            cache,
        })
    }

    /// Create the deposit's ledger entry unless one already exists. The
    /// existence check is keyed on user + amount + kind within the window
    /// starting at the deposit's creation, tolerating entries written by
    /// the webhook path, the poll path or a separate job.
    async fn ensure_deposit_entry(&self, deposit: &Deposit) -> Result<bool, PaymentError> {
        let exists = self
            .store
            .has_entry_since(
                deposit.user_id,
                LedgerEntryKind::Deposit,
                deposit.amount,
                deposit.created_at,
            )
            .await?;
        if exists {
            return Ok(false);
        }

        self.store
            .insert_entry(NewLedgerEntry {
                user_id: deposit.user_id,
                kind: LedgerEntryKind::Deposit,
                amount: deposit.amount,
                currency: deposit.currency.clone(),
                status: "completed".to_string(),
                description: format!("Deposit via Flutterwave (ref: {})", deposit.tx_ref),
            })
            .await?;
        Ok(true)
    }

    /// Batch reconciliation: verify pending deposits against the gateway
    /// and apply completions, then repair completed deposits whose ledger
    /// entry is missing.
    pub async fn reconcile_pending(&self, limit: i64) -> Result<ReconcileSummary, PaymentError> {
        let mut summary = ReconcileSummary::default();

        for deposit in self.store.pending_deposits(limit).await? {
            summary.examined += 1;

            let verified = match self.verify_remote(&deposit).await {
                Ok(verified) => verified,
                Err(err) => {
                    warn!(deposit_id = deposit.deposit_id, %err, "Batch verify failed");
                    continue;
                }
            };

            if !verified.status.is_success() {
                continue;
            }

            let gateway_tx_id = verified
                .gateway_tx_id
                .unwrap_or_else(|| deposit.tx_ref.clone());
            match self.apply_completion(&deposit, &gateway_tx_id).await {
                Ok(outcome) if outcome.is_fresh() => summary.completed += 1,
                Ok(_) => {}
                Err(err) => {
                    warn!(deposit_id = deposit.deposit_id, %err, "Batch completion failed");
                }
            }
        }

        summary.repaired_entries = self.repair_missing_entries(limit).await?;
        Ok(summary)
    }

    /// Scan for the repairable anomaly: completed deposits with no
    /// matching ledger entry.
    pub async fn repair_missing_entries(&self, limit: i64) -> Result<usize, PaymentError> {
        let mut repaired = 0;
        for deposit in self.store.completed_deposits_missing_entries(limit).await? {
            if self.ensure_deposit_entry(&deposit).await? {
                warn!(
                    deposit_id = deposit.deposit_id,
                    "Repaired missing ledger entry for completed deposit"
                );
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}
