//! Daily Win backend — payment reconciliation & balance ledger
//!
//! Turns external payment-gateway events (webhook callbacks and polled
//! verification calls) into durable, idempotent ledger state; derives
//! spendable balances from that ledger; enforces withdrawal eligibility;
//! and drives the external funds-transfer call — while keeping the
//! authoritative relational ledger and the derived balance cache
//! approximately consistent.
//!
//! # Modules
//!
//! - [`payment`] - Reconciliation, balance and withdrawal engines
//! - [`cache`] - Derived balance cache (dual-store policy)
//! - [`gateway`] - HTTP server, shared state, response envelope
//! - [`user_auth`] - JWT validation middleware
//! - [`db`] - PostgreSQL pool and ledger schema bootstrap
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing initialisation

pub mod cache;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod payment;
pub mod user_auth;

// Convenient re-exports at crate root
pub use cache::{BalanceCache, MemoryBalanceCache, MirrorStatus, MongoBalanceCache};
pub use config::AppConfig;
pub use db::Database;
pub use payment::{
    BalanceService, BalanceSummary, CompletionOutcome, DepositService, FlutterwaveClient,
    LedgerStore, PaymentError, PaymentGateway, PgLedgerStore, SignatureVerifier,
    WebhookIngestor, WithdrawService,
};
pub use user_auth::{AuthVerifier, Claims};
