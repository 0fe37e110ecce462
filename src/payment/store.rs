//! Ledger storage seam
//!
//! `LedgerStore` is the narrow set of relational operations the payment
//! engines need. All status transitions are atomic CAS (Compare-And-Swap)
//! updates on the status column; callers learn from the returned bool
//! whether they won the transition or a concurrent writer got there first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::error::PaymentError;
use super::models::{
    Deposit, DepositStatus, LedgerEntry, LedgerEntryKind, NewDeposit, NewLedgerEntry,
    NewWithdrawal, Withdrawal, WithdrawalStatus,
};

/// Relational ledger operations used by the reconciliation, balance and
/// withdrawal engines.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- Deposits ---

    /// Insert a new pending deposit and return the stored row.
    async fn insert_deposit(&self, new: NewDeposit) -> Result<Deposit, PaymentError>;

    /// Remove a deposit whose initiation never reached the gateway.
    /// Only legal while the row is still pending.
    async fn delete_deposit_initiation(&self, deposit_id: i64) -> Result<(), PaymentError>;

    async fn deposit_by_id(&self, deposit_id: i64) -> Result<Option<Deposit>, PaymentError>;

    async fn deposit_by_reference(&self, tx_ref: &str) -> Result<Option<Deposit>, PaymentError>;

    /// CAS `pending -> completed`, recording the gateway transaction id and
    /// completion time. Returns false when the deposit was not pending,
    /// i.e. a concurrent or repeated completion already won.
    async fn complete_deposit(
        &self,
        deposit_id: i64,
        gateway_tx_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, PaymentError>;

    /// Oldest pending deposits, for batch verification.
    async fn pending_deposits(&self, limit: i64) -> Result<Vec<Deposit>, PaymentError>;

    /// Completed deposits with no matching ledger entry — the detectable,
    /// repairable anomaly left by a failed entry write.
    async fn completed_deposits_missing_entries(
        &self,
        limit: i64,
    ) -> Result<Vec<Deposit>, PaymentError>;

    // --- Withdrawals ---

    async fn insert_withdrawal(&self, new: NewWithdrawal) -> Result<Withdrawal, PaymentError>;

    async fn withdrawal_by_id(
        &self,
        withdrawal_id: i64,
    ) -> Result<Option<Withdrawal>, PaymentError>;

    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>, PaymentError>;

    /// CAS a withdrawal from `from` to `to`. Returns false when the row was
    /// no longer in `from`. Rejects transitions the state machine does not
    /// allow.
    async fn advance_withdrawal(
        &self,
        withdrawal_id: i64,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> Result<bool, PaymentError>;

    /// Record the gateway transfer id after a successful dispatch.
    async fn set_withdrawal_transfer(
        &self,
        withdrawal_id: i64,
        transfer_id: &str,
    ) -> Result<(), PaymentError>;

    // --- Ledger entries ---

    /// Whether an entry of this kind and amount exists for the user at or
    /// after `since`. The window tolerates the entry having been created by
    /// the webhook path, the poll path or the repair job.
    async fn has_entry_since(
        &self,
        user_id: i64,
        kind: LedgerEntryKind,
        amount: Decimal,
        since: DateTime<Utc>,
    ) -> Result<bool, PaymentError>;

    async fn insert_entry(&self, new: NewLedgerEntry) -> Result<(), PaymentError>;

    /// Most recent entries for a user, newest first.
    async fn entries_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, PaymentError>;

    // --- Webhook archive ---

    /// Append a raw gateway payload to the forensic archive.
    async fn archive_webhook_event(
        &self,
        payload: &serde_json::Value,
    ) -> Result<(), PaymentError>;

    // --- Balance sums ---

    async fn sum_completed_deposits(&self, user_id: i64) -> Result<Decimal, PaymentError>;

    /// Sum of withdrawal amounts for the user in any of `statuses`,
    /// optionally restricted to rows created at or after `since`.
    async fn sum_withdrawals(
        &self,
        user_id: i64,
        statuses: &[WithdrawalStatus],
        since: Option<DateTime<Utc>>,
    ) -> Result<Decimal, PaymentError>;

    /// Sum of completed deposits across all users (jackpot aggregate).
    async fn sum_all_completed_deposits(&self) -> Result<Decimal, PaymentError>;

    /// Persist the recomputed jackpot scalar.
    async fn upsert_jackpot(
        &self,
        amount: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PaymentError>;
}

/// PostgreSQL-backed ledger store.
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn deposit_from_row(row: &PgRow) -> Result<Deposit, PaymentError> {
        let status_str: String = row.get("status");
        let status: DepositStatus = status_str
            .parse()
            .map_err(|e: String| PaymentError::InvalidState(e))?;

        Ok(Deposit {
            deposit_id: row.get("deposit_id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            tx_ref: row.get("tx_ref"),
            gateway_tx_id: row.get("gateway_tx_id"),
            status,
            payment_method: row.get("payment_method"),
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
        })
    }

    fn withdrawal_from_row(row: &PgRow) -> Result<Withdrawal, PaymentError> {
        let status_str: String = row.get("status");
        let status: WithdrawalStatus = status_str
            .parse()
            .map_err(|e: String| PaymentError::InvalidState(e))?;

        Ok(Withdrawal {
            withdrawal_id: row.get("withdrawal_id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            bank_code: row.get("bank_code"),
            account_number: row.get("account_number"),
            account_name: row.get("account_name"),
            gateway_transfer_id: row.get("gateway_transfer_id"),
            status,
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
        })
    }

    fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, PaymentError> {
        let kind_str: String = row.get("kind");
        let kind: LedgerEntryKind = kind_str
            .parse()
            .map_err(|e: String| PaymentError::InvalidState(e))?;

        Ok(LedgerEntry {
            entry_id: row.get("entry_id"),
            user_id: row.get("user_id"),
            kind,
            amount: row.get("amount"),
            currency: row.get("currency"),
            status: row.get("status"),
            description: row.get("description"),
            created_at: row.get("created_at"),
        })
    }
}

const DEPOSIT_COLUMNS: &str = "deposit_id, user_id, amount, currency, tx_ref, gateway_tx_id, \
     status, payment_method, created_at, completed_at";

const WITHDRAWAL_COLUMNS: &str = "withdrawal_id, user_id, amount, currency, bank_code, \
     account_number, account_name, gateway_transfer_id, status, created_at, completed_at";

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_deposit(&self, new: NewDeposit) -> Result<Deposit, PaymentError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO deposits (user_id, amount, currency, tx_ref, status, payment_method)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING {DEPOSIT_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.amount)
        .bind(&new.currency)
        .bind(&new.tx_ref)
        .bind(&new.payment_method)
        .fetch_one(&self.pool)
        .await?;

        Self::deposit_from_row(&row)
    }

    async fn delete_deposit_initiation(&self, deposit_id: i64) -> Result<(), PaymentError> {
        // Guard on pending: terminal deposits are never physically deleted.
        sqlx::query("DELETE FROM deposits WHERE deposit_id = $1 AND status = 'pending'")
            .bind(deposit_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deposit_by_id(&self, deposit_id: i64) -> Result<Option<Deposit>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE deposit_id = $1"
        ))
        .bind(deposit_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::deposit_from_row(&r)).transpose()
    }

    async fn deposit_by_reference(&self, tx_ref: &str) -> Result<Option<Deposit>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE tx_ref = $1"
        ))
        .bind(tx_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::deposit_from_row(&r)).transpose()
    }

    async fn complete_deposit(
        &self,
        deposit_id: i64,
        gateway_tx_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, PaymentError> {
        let result = sqlx::query(
            r#"
            UPDATE deposits
            SET status = 'completed', gateway_tx_id = $1, completed_at = $2
            WHERE deposit_id = $3 AND status = 'pending'
            "#,
        )
        .bind(gateway_tx_id)
        .bind(completed_at)
        .bind(deposit_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending_deposits(&self, limit: i64) -> Result<Vec<Deposit>, PaymentError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEPOSIT_COLUMNS} FROM deposits
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::deposit_from_row).collect()
    }

    async fn completed_deposits_missing_entries(
        &self,
        limit: i64,
    ) -> Result<Vec<Deposit>, PaymentError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEPOSIT_COLUMNS} FROM deposits d
            WHERE d.status = 'completed'
              AND NOT EXISTS (
                  SELECT 1 FROM ledger_entries e
                  WHERE e.user_id = d.user_id
                    AND e.kind = 'deposit'
                    AND e.amount = d.amount
                    AND e.created_at >= d.created_at
              )
            ORDER BY d.completed_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::deposit_from_row).collect()
    }

    async fn insert_withdrawal(&self, new: NewWithdrawal) -> Result<Withdrawal, PaymentError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO withdrawals
                (user_id, amount, currency, bank_code, account_number, account_name, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.amount)
        .bind(&new.currency)
        .bind(&new.bank_code)
        .bind(&new.account_number)
        .bind(&new.account_name)
        .fetch_one(&self.pool)
        .await?;

        Self::withdrawal_from_row(&row)
    }

    async fn withdrawal_by_id(
        &self,
        withdrawal_id: i64,
    ) -> Result<Option<Withdrawal>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE withdrawal_id = $1"
        ))
        .bind(withdrawal_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::withdrawal_from_row(&r)).transpose()
    }

    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>, PaymentError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals
            WHERE status = 'pending'
            ORDER BY created_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::withdrawal_from_row).collect()
    }

    async fn advance_withdrawal(
        &self,
        withdrawal_id: i64,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> Result<bool, PaymentError> {
        if !from.can_advance_to(to) {
            return Err(PaymentError::InvalidState(format!(
                "Illegal withdrawal transition: {} -> {}",
                from, to
            )));
        }

        let result = if to.is_terminal() {
            sqlx::query(
                r#"
                UPDATE withdrawals
                SET status = $1, completed_at = NOW()
                WHERE withdrawal_id = $2 AND status = $3
                "#,
            )
            .bind(to.as_str())
            .bind(withdrawal_id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE withdrawals
                SET status = $1
                WHERE withdrawal_id = $2 AND status = $3
                "#,
            )
            .bind(to.as_str())
            .bind(withdrawal_id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    async fn set_withdrawal_transfer(
        &self,
        withdrawal_id: i64,
        transfer_id: &str,
    ) -> Result<(), PaymentError> {
        sqlx::query("UPDATE withdrawals SET gateway_transfer_id = $1 WHERE withdrawal_id = $2")
            .bind(transfer_id)
            .bind(withdrawal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_entry_since(
        &self,
        user_id: i64,
        kind: LedgerEntryKind,
        amount: Decimal,
        since: DateTime<Utc>,
    ) -> Result<bool, PaymentError> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present FROM ledger_entries
            WHERE user_id = $1 AND kind = $2 AND amount = $3 AND created_at >= $4
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(amount)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn insert_entry(&self, new: NewLedgerEntry) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, kind, amount, currency, status, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(new.amount)
        .bind(&new.currency)
        .bind(&new.status)
        .bind(&new.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn entries_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, PaymentError> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, user_id, kind, amount, currency, status, description, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn archive_webhook_event(
        &self,
        payload: &serde_json::Value,
    ) -> Result<(), PaymentError> {
        sqlx::query("INSERT INTO webhook_events (payload) VALUES ($1)")
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sum_completed_deposits(&self, user_id: i64) -> Result<Decimal, PaymentError> {
        let sum: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM deposits WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(Decimal::ZERO))
    }

    async fn sum_withdrawals(
        &self,
        user_id: i64,
        statuses: &[WithdrawalStatus],
        since: Option<DateTime<Utc>>,
    ) -> Result<Decimal, PaymentError> {
        let status_strs: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let sum: Option<Decimal> = match since {
            Some(since) => {
                sqlx::query_scalar(
                    r#"
                    SELECT SUM(amount) FROM withdrawals
                    WHERE user_id = $1 AND status = ANY($2) AND created_at >= $3
                    "#,
                )
                .bind(user_id)
                .bind(&status_strs)
                .bind(since)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT SUM(amount) FROM withdrawals WHERE user_id = $1 AND status = ANY($2)",
                )
                .bind(user_id)
                .bind(&status_strs)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(sum.unwrap_or(Decimal::ZERO))
    }

    async fn sum_all_completed_deposits(&self) -> Result<Decimal, PaymentError> {
        let sum: Option<Decimal> =
            sqlx::query_scalar("SELECT SUM(amount) FROM deposits WHERE status = 'completed'")
                .fetch_one(&self.pool)
                .await?;

        Ok(sum.unwrap_or(Decimal::ZERO))
    }

    async fn upsert_jackpot(
        &self,
        amount: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO global_jackpot (jackpot_id, current_amount, updated_at)
            VALUES (1, $1, $2)
            ON CONFLICT (jackpot_id) DO UPDATE
            SET current_amount = EXCLUDED.current_amount, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(amount)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory ledger store with the same CAS semantics as the Postgres
    //! implementation. Every mutation holds the state lock for its whole
    //! read-check-write, so concurrent completions observe real races.

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryState {
        deposits: Vec<Deposit>,
        withdrawals: Vec<Withdrawal>,
        entries: Vec<LedgerEntry>,
        events: Vec<serde_json::Value>,
        jackpot: Option<(Decimal, DateTime<Utc>)>,
        next_deposit_id: i64,
        next_withdrawal_id: i64,
        next_entry_id: i64,
    }

    #[derive(Default)]
    pub struct MemoryLedgerStore {
        state: Mutex<MemoryState>,
    }

    impl MemoryLedgerStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entry_count(&self) -> usize {
            self.state.lock().unwrap().entries.len()
        }

        pub fn archived_event_count(&self) -> usize {
            self.state.lock().unwrap().events.len()
        }
    }

    #[async_trait]
    impl LedgerStore for MemoryLedgerStore {
        async fn insert_deposit(&self, new: NewDeposit) -> Result<Deposit, PaymentError> {
            let mut state = self.state.lock().unwrap();
            state.next_deposit_id += 1;
            let deposit = Deposit {
                deposit_id: state.next_deposit_id,
                user_id: new.user_id,
                amount: new.amount,
                currency: new.currency,
                tx_ref: new.tx_ref,
                gateway_tx_id: None,
                status: DepositStatus::Pending,
                payment_method: new.payment_method,
                created_at: Utc::now(),
                completed_at: None,
            };
            state.deposits.push(deposit.clone());
            Ok(deposit)
        }

        async fn delete_deposit_initiation(&self, deposit_id: i64) -> Result<(), PaymentError> {
            let mut state = self.state.lock().unwrap();
            state
                .deposits
                .retain(|d| d.deposit_id != deposit_id || d.status != DepositStatus::Pending);
            Ok(())
        }

        async fn deposit_by_id(&self, deposit_id: i64) -> Result<Option<Deposit>, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .deposits
                .iter()
                .find(|d| d.deposit_id == deposit_id)
                .cloned())
        }

        async fn deposit_by_reference(
            &self,
            tx_ref: &str,
        ) -> Result<Option<Deposit>, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state.deposits.iter().find(|d| d.tx_ref == tx_ref).cloned())
        }

        async fn complete_deposit(
            &self,
            deposit_id: i64,
            gateway_tx_id: &str,
            completed_at: DateTime<Utc>,
        ) -> Result<bool, PaymentError> {
            let mut state = self.state.lock().unwrap();
            match state
                .deposits
                .iter_mut()
                .find(|d| d.deposit_id == deposit_id && d.status == DepositStatus::Pending)
            {
                Some(deposit) => {
                    deposit.status = DepositStatus::Completed;
                    deposit.gateway_tx_id = Some(gateway_tx_id.to_string());
                    deposit.completed_at = Some(completed_at);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn pending_deposits(&self, limit: i64) -> Result<Vec<Deposit>, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .deposits
                .iter()
                .filter(|d| d.status == DepositStatus::Pending)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn completed_deposits_missing_entries(
            &self,
            limit: i64,
        ) -> Result<Vec<Deposit>, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .deposits
                .iter()
                .filter(|d| {
                    d.status == DepositStatus::Completed
                        && !state.entries.iter().any(|e| {
                            e.user_id == d.user_id
                                && e.kind == LedgerEntryKind::Deposit
                                && e.amount == d.amount
                                && e.created_at >= d.created_at
                        })
                })
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn insert_withdrawal(
            &self,
            new: NewWithdrawal,
        ) -> Result<Withdrawal, PaymentError> {
            let mut state = self.state.lock().unwrap();
            state.next_withdrawal_id += 1;
            let withdrawal = Withdrawal {
                withdrawal_id: state.next_withdrawal_id,
                user_id: new.user_id,
                amount: new.amount,
                currency: new.currency,
                bank_code: new.bank_code,
                account_number: new.account_number,
                account_name: new.account_name,
                gateway_transfer_id: None,
                status: WithdrawalStatus::Pending,
                created_at: Utc::now(),
                completed_at: None,
            };
            state.withdrawals.push(withdrawal.clone());
            Ok(withdrawal)
        }

        async fn withdrawal_by_id(
            &self,
            withdrawal_id: i64,
        ) -> Result<Option<Withdrawal>, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .withdrawals
                .iter()
                .find(|w| w.withdrawal_id == withdrawal_id)
                .cloned())
        }

        async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .withdrawals
                .iter()
                .filter(|w| w.status == WithdrawalStatus::Pending)
                .cloned()
                .collect())
        }

        async fn advance_withdrawal(
            &self,
            withdrawal_id: i64,
            from: WithdrawalStatus,
            to: WithdrawalStatus,
        ) -> Result<bool, PaymentError> {
            if !from.can_advance_to(to) {
                return Err(PaymentError::InvalidState(format!(
                    "Illegal withdrawal transition: {} -> {}",
                    from, to
                )));
            }

            let mut state = self.state.lock().unwrap();
            match state
                .withdrawals
                .iter_mut()
                .find(|w| w.withdrawal_id == withdrawal_id && w.status == from)
            {
                Some(withdrawal) => {
                    withdrawal.status = to;
                    if to.is_terminal() {
                        withdrawal.completed_at = Some(Utc::now());
                    }
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn set_withdrawal_transfer(
            &self,
            withdrawal_id: i64,
            transfer_id: &str,
        ) -> Result<(), PaymentError> {
            let mut state = self.state.lock().unwrap();
            if let Some(withdrawal) = state
                .withdrawals
                .iter_mut()
                .find(|w| w.withdrawal_id == withdrawal_id)
            {
                withdrawal.gateway_transfer_id = Some(transfer_id.to_string());
            }
            Ok(())
        }

        async fn has_entry_since(
            &self,
            user_id: i64,
            kind: LedgerEntryKind,
            amount: Decimal,
            since: DateTime<Utc>,
        ) -> Result<bool, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state.entries.iter().any(|e| {
                e.user_id == user_id
                    && e.kind == kind
                    && e.amount == amount
                    && e.created_at >= since
            }))
        }

        async fn insert_entry(&self, new: NewLedgerEntry) -> Result<(), PaymentError> {
            let mut state = self.state.lock().unwrap();
            state.next_entry_id += 1;
            let entry = LedgerEntry {
                entry_id: state.next_entry_id,
                user_id: new.user_id,
                kind: new.kind,
                amount: new.amount,
                currency: new.currency,
                status: new.status,
                description: new.description,
                created_at: Utc::now(),
            };
            state.entries.push(entry);
            Ok(())
        }

        async fn entries_for_user(
            &self,
            user_id: i64,
            limit: i64,
        ) -> Result<Vec<LedgerEntry>, PaymentError> {
            let state = self.state.lock().unwrap();
            let mut entries: Vec<LedgerEntry> = state
                .entries
                .iter()
                .filter(|e| e.user_id == user_id)
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            entries.truncate(limit as usize);
            Ok(entries)
        }

        async fn archive_webhook_event(
            &self,
            payload: &serde_json::Value,
        ) -> Result<(), PaymentError> {
            let mut state = self.state.lock().unwrap();
            state.events.push(payload.clone());
            Ok(())
        }

        async fn sum_completed_deposits(&self, user_id: i64) -> Result<Decimal, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .deposits
                .iter()
                .filter(|d| d.user_id == user_id && d.status == DepositStatus::Completed)
                .map(|d| d.amount)
                .sum())
        }

        async fn sum_withdrawals(
            &self,
            user_id: i64,
            statuses: &[WithdrawalStatus],
            since: Option<DateTime<Utc>>,
        ) -> Result<Decimal, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .withdrawals
                .iter()
                .filter(|w| {
                    w.user_id == user_id
                        && statuses.contains(&w.status)
                        && since.is_none_or(|t| w.created_at >= t)
                })
                .map(|w| w.amount)
                .sum())
        }

        async fn sum_all_completed_deposits(&self) -> Result<Decimal, PaymentError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .deposits
                .iter()
                .filter(|d| d.status == DepositStatus::Completed)
                .map(|d| d.amount)
                .sum())
        }

        async fn upsert_jackpot(
            &self,
            amount: Decimal,
            updated_at: DateTime<Utc>,
        ) -> Result<(), PaymentError> {
            let mut state = self.state.lock().unwrap();
            state.jackpot = Some((amount, updated_at));
            Ok(())
        }
    }
}
