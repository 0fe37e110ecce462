//! Database connection management

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Idempotent schema bootstrap for the ledger tables.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        tracing::info!("Ledger schema verified");
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS deposits (
        deposit_id      BIGSERIAL PRIMARY KEY,
        user_id         BIGINT NOT NULL,
        amount          NUMERIC(20, 2) NOT NULL,
        currency        VARCHAR(10) NOT NULL DEFAULT 'USD',
        tx_ref          VARCHAR(255) NOT NULL UNIQUE,
        gateway_tx_id   VARCHAR(255) UNIQUE,
        status          VARCHAR(20) NOT NULL DEFAULT 'pending',
        payment_method  VARCHAR(50) NOT NULL DEFAULT '',
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at    TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_deposits_user_status ON deposits (user_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS withdrawals (
        withdrawal_id       BIGSERIAL PRIMARY KEY,
        user_id             BIGINT NOT NULL,
        amount              NUMERIC(20, 2) NOT NULL,
        currency            VARCHAR(10) NOT NULL DEFAULT 'USD',
        bank_code           VARCHAR(20) NOT NULL,
        account_number      VARCHAR(50) NOT NULL,
        account_name        VARCHAR(255) NOT NULL,
        gateway_transfer_id VARCHAR(255) UNIQUE,
        status              VARCHAR(20) NOT NULL DEFAULT 'pending',
        created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at        TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_user_status ON withdrawals (user_id, status, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        entry_id    BIGSERIAL PRIMARY KEY,
        user_id     BIGINT NOT NULL,
        kind        VARCHAR(20) NOT NULL,
        amount      NUMERIC(20, 2) NOT NULL,
        currency    VARCHAR(10) NOT NULL DEFAULT 'USD',
        status      VARCHAR(20) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ledger_entries_user ON ledger_entries (user_id, kind, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS webhook_events (
        event_id    BIGSERIAL PRIMARY KEY,
        payload     JSONB NOT NULL,
        received_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS global_jackpot (
        jackpot_id     SMALLINT PRIMARY KEY,
        current_amount NUMERIC(20, 2) NOT NULL DEFAULT 0,
        currency       VARCHAR(10) NOT NULL DEFAULT 'USD',
        updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];
