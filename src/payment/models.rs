//! Ledger domain records
//!
//! Typed rows for the relational source of truth: deposits, withdrawals,
//! ledger entries, archived webhook events and the jackpot aggregate.
//! Status enums carry the legal state transitions; the stores enforce them
//! with compare-and-set updates on the string column.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deposit lifecycle: `pending -> completed` (terminal success) or
/// `pending -> failed` (terminal failure, initiation never reached the gateway).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Completed,
    Failed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Completed => "completed",
            DepositStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DepositStatus::Pending),
            "completed" => Ok(DepositStatus::Completed),
            "failed" => Ok(DepositStatus::Failed),
            _ => Err(format!("Invalid deposit status: {}", s)),
        }
    }
}

/// Withdrawal lifecycle: `pending -> {processing, failed, rejected}`,
/// `processing -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    /// Whether `next` is a legal single-step advance from this status.
    pub fn can_advance_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (*self, next),
            (
                WithdrawalStatus::Pending,
                WithdrawalStatus::Processing
                    | WithdrawalStatus::Failed
                    | WithdrawalStatus::Rejected
            ) | (
                WithdrawalStatus::Processing,
                WithdrawalStatus::Completed | WithdrawalStatus::Failed
            )
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed | WithdrawalStatus::Rejected
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "processing" => Ok(WithdrawalStatus::Processing),
            "completed" => Ok(WithdrawalStatus::Completed),
            "failed" => Ok(WithdrawalStatus::Failed),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            _ => Err(format!("Invalid withdrawal status: {}", s)),
        }
    }
}

/// Kind of financial movement recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryKind {
    Deposit,
    Withdrawal,
}

impl LedgerEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::Deposit => "deposit",
            LedgerEntryKind::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LedgerEntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(LedgerEntryKind::Deposit),
            "withdrawal" => Ok(LedgerEntryKind::Withdrawal),
            _ => Err(format!("Invalid ledger entry kind: {}", s)),
        }
    }
}

/// One attempted funding event. Once `completed`, amount/currency/tx_ref
/// are immutable and the row is never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Deposit {
    pub deposit_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    /// Our reference, sent to the gateway at initiation. Unique.
    pub tx_ref: String,
    /// Gateway-issued transaction id, recorded at completion. Unique.
    pub gateway_tx_id: Option<String>,
    pub status: DepositStatus,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new pending deposit.
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub tx_ref: String,
    pub payment_method: String,
}

/// One payout request with its destination bank account.
#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    pub withdrawal_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    /// Gateway-issued transfer id, recorded once the transfer is dispatched.
    pub gateway_transfer_id: Option<String>,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new pending withdrawal.
#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

/// Append-mostly record of one financial movement.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub user_id: i64,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a ledger entry.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub description: String,
}

/// Cached sum over all completed deposits, refreshed on read.
#[derive(Debug, Clone, Serialize)]
pub struct JackpotSnapshot {
    pub current_amount: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_status_roundtrip() {
        for s in [
            DepositStatus::Pending,
            DepositStatus::Completed,
            DepositStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<DepositStatus>(), Ok(s));
        }
        assert!("done".parse::<DepositStatus>().is_err());
    }

    #[test]
    fn test_withdrawal_transitions() {
        use WithdrawalStatus::*;

        assert!(Pending.can_advance_to(Processing));
        assert!(Pending.can_advance_to(Failed));
        assert!(Pending.can_advance_to(Rejected));
        assert!(Processing.can_advance_to(Completed));
        assert!(Processing.can_advance_to(Failed));

        // Illegal advances
        assert!(!Pending.can_advance_to(Completed));
        assert!(!Processing.can_advance_to(Rejected));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Rejected.can_advance_to(Processing));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(!WithdrawalStatus::Processing.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
        assert!(DepositStatus::Completed.is_terminal());
        assert!(!DepositStatus::Pending.is_terminal());
    }

    #[test]
    fn test_ledger_kind_roundtrip() {
        assert_eq!("deposit".parse(), Ok(LedgerEntryKind::Deposit));
        assert_eq!("withdrawal".parse(), Ok(LedgerEntryKind::Withdrawal));
        assert!("transfer".parse::<LedgerEntryKind>().is_err());
    }
}
