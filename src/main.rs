use anyhow::Context;
use std::sync::Arc;
use tracing::warn;

use dailywin_backend::cache::{BalanceCache, MemoryBalanceCache, MongoBalanceCache};
use dailywin_backend::config::AppConfig;
use dailywin_backend::db::Database;
use dailywin_backend::gateway::{self, state::AppState};
use dailywin_backend::payment::{
    BalanceService, DepositService, FlutterwaveClient, LedgerStore, PaymentGateway,
    PgLedgerStore, SignatureVerifier, WebhookIngestor, WithdrawService,
};
use dailywin_backend::user_auth::AuthVerifier;
use dailywin_backend::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::args().nth(1).unwrap_or_else(|| "dev".to_string());
    let config = AppConfig::load(&env);
    let _guard = logging::init_logging(&config);

    // Authoritative relational ledger
    let db = Arc::new(
        Database::connect(&config.postgres_url)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    db.init_schema().await.context("Schema bootstrap failed")?;
    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(db.pool().clone()));

    // Derived balance cache: document store when configured, in-process
    // fallback otherwise. The ledger stays the source of truth either way.
    let cache: Arc<dyn BalanceCache> = if config.mongo.enabled {
        match MongoBalanceCache::connect(&config.mongo.uri, &config.mongo.database).await {
            Ok(mongo) => Arc::new(mongo),
            Err(e) => {
                warn!(%e, "MongoDB unreachable; using in-process balance cache");
                Arc::new(MemoryBalanceCache::new())
            }
        }
    } else {
        Arc::new(MemoryBalanceCache::new())
    };

    // One configured gateway client, reused across requests
    let gateway_client: Arc<dyn PaymentGateway> = Arc::new(FlutterwaveClient::new(
        config.flutterwave.base_url.clone(),
        config.flutterwave.secret_key.clone(),
    ));

    let balances = BalanceService::new(store.clone());
    let deposits = Arc::new(DepositService::new(
        store.clone(),
        gateway_client.clone(),
        cache.clone(),
        config.frontend_url.clone(),
    ));
    let withdrawals = Arc::new(WithdrawService::new(
        store.clone(),
        gateway_client.clone(),
        balances.clone(),
    ));
    let webhooks = Arc::new(WebhookIngestor::new(
        SignatureVerifier::new(config.flutterwave.webhook_secret.as_bytes().to_vec()),
        deposits.clone(),
    ));
    let auth = AuthVerifier::new(config.jwt_secret.clone());

    let state = Arc::new(AppState::new(
        deposits,
        withdrawals,
        balances,
        webhooks,
        auth,
        db,
    ));

    gateway::run_server(&config.gateway.host, config.gateway.port, state).await;
    Ok(())
}
