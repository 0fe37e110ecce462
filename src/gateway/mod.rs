pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::payment::handlers;
use crate::user_auth::middleware::{jwt_auth_middleware, require_admin};
use state::AppState;

/// Start the HTTP gateway server.
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) {
    // Authenticated user routes
    let protected_payments = Router::new()
        .route("/deposit/initiate", post(handlers::initiate_deposit))
        .route(
            "/deposit/{deposit_id}/verify",
            get(handlers::verify_deposit),
        )
        .route("/balance", get(handlers::get_balance))
        .route("/transactions", get(handlers::get_transactions))
        .route("/withdraw", post(handlers::request_withdrawal))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // The webhook authenticates by signature, not by session
    let payment_routes = Router::new()
        .route("/webhook", post(handlers::webhook))
        .merge(protected_payments);

    // Admin routes: JWT first (outer layer), then the role check
    let admin_routes = Router::new()
        .route(
            "/withdrawals/pending",
            get(handlers::list_pending_withdrawals),
        )
        .route(
            "/withdrawals/{withdrawal_id}/approve",
            post(handlers::approve_withdrawal),
        )
        .route(
            "/withdrawals/{withdrawal_id}/reject",
            post(handlers::reject_withdrawal),
        )
        .route("/reconcile", post(handlers::run_reconciliation))
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let app = Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/jackpot", get(handlers::get_jackpot))
        .nest("/api/v1/payments", payment_routes)
        .nest("/api/v1/admin", admin_routes)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("FATAL: Failed to bind to {}: {}", addr, e);
            eprintln!(
                "   Hint: Port {} may already be in use. Check with: lsof -i :{}",
                port, port
            );
            std::process::exit(1);
        }
    };

    println!("🚀 Gateway listening on http://{}", addr);
    println!("📬 Webhook endpoint: /api/v1/payments/webhook");
    println!("🔒 Payment API:     /api/v1/payments/* (JWT required)");
    println!("🛡  Admin API:       /api/v1/admin/* (admin JWT required)");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("FATAL: Server error: {}", e);
        std::process::exit(1);
    }
}
