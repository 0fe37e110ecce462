use std::sync::Arc;

use crate::payment::{
    BalanceService, DepositService, WebhookIngestor, WithdrawService,
};
use crate::user_auth::AuthVerifier;

/// Shared gateway application state. All services are constructed once at
/// process start and injected; handlers only borrow them.
#[derive(Clone)]
pub struct AppState {
    pub deposits: Arc<DepositService>,
    pub withdrawals: Arc<WithdrawService>,
    pub balances: BalanceService,
    pub webhooks: Arc<WebhookIngestor>,
    pub auth: AuthVerifier,
    pub db: Arc<crate::db::Database>,
}

impl AppState {
    pub fn new(
        deposits: Arc<DepositService>,
        withdrawals: Arc<WithdrawService>,
        balances: BalanceService,
        webhooks: Arc<WebhookIngestor>,
        auth: AuthVerifier,
        db: Arc<crate::db::Database>,
    ) -> Self {
        Self {
            deposits,
            withdrawals,
            balances,
            webhooks,
            auth,
            db,
        }
    }
}
