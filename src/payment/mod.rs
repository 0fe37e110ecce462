//! Payment reconciliation & balance ledger subsystem
//!
//! Turns external gateway events into durable, idempotent ledger state,
//! derives spendable balances from the ledger, enforces withdrawal
//! eligibility, and drives the external transfer call — while keeping the
//! authoritative relational ledger and the derived balance cache
//! approximately consistent.

pub mod balance;
pub mod deposit;
pub mod error;
pub mod flutterwave;
pub mod handlers;
pub mod models;
pub mod store;
pub mod webhook;
pub mod withdraw;


pub use balance::{BalanceService, BalanceSummary};
pub use deposit::{CompletionOutcome, DepositService};
pub use error::PaymentError;
pub use flutterwave::{FlutterwaveClient, PaymentGateway};
pub use store::{LedgerStore, PgLedgerStore};
pub use webhook::{SignatureVerifier, WebhookIngestor};
pub use withdraw::WithdrawService;
