//! HTTP router setup.

use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Upper bound for any request; a manual trigger returns before its cycle runs.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the application router.
pub fn create(state: Arc<AppState>) -> Router {
    create_with(state, None)
}

/// Create the application router with fee-paying `relay_routes` mounted
/// behind the admission gate.
pub fn create_with(state: Arc<AppState>, relay_routes: Option<Router<Arc<AppState>>>) -> Router {
    let base = match relay_routes {
        Some(routes) => guarded(state.clone(), routes),
        None => Router::new(),
    };
    base.route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/fund-manager/status", get(handlers::fund_manager_status))
        .route(
            "/fund-manager/trigger",
            post(handlers::fund_manager_trigger)
                .route_layer(axum::middleware::from_fn(middleware::api_key_auth)),
        )
        .layer(axum::middleware::from_fn(middleware::inject_request_id))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Put fee-paying relay routes behind the admission gate. `routes` must
/// not be empty.
pub fn guarded(state: Arc<AppState>, routes: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    routes.route_layer(axum::middleware::from_fn_with_state(
        state,
        middleware::admission_guard,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sweep::SweepStrategy;
    use crate::testing::{sol, FakeFaucet, FakeLedger, FakeStrategy};
    use crate::wallet::CustodialWallet;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use tower::ServiceExt;

    fn state(ledger: &Arc<FakeLedger>, faucet: &Arc<FakeFaucet>) -> Arc<AppState> {
        let mut config = Config {
            token_mint: Pubkey::new_unique().to_string(),
            operator_address: Pubkey::new_unique().to_string(),
            ..Config::default()
        };
        config.maintenance.settle_delay_ms = 0;
        let chain = vec![FakeStrategy::new("direct_transfer", true, true) as Arc<dyn SweepStrategy>];
        Arc::new(
            AppState::from_parts(
                config,
                ledger.clone(),
                faucet.clone(),
                Arc::new(CustodialWallet::new(Keypair::new())),
                chain,
            )
            .unwrap(),
        )
    }

    fn app(state: Arc<AppState>) -> Router {
        let relay = Router::new().route("/relay", post(|| async { "relayed" }));
        create_with(state, Some(relay))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn setup(native: f64) -> (Arc<FakeLedger>, Arc<FakeFaucet>) {
        let ledger = Arc::new(FakeLedger::with_native(sol(native)));
        let faucet = Arc::new(FakeFaucet::new(ledger.clone()));
        (ledger, faucet)
    }

    #[tokio::test]
    async fn test_status_reports_stopped_scheduler() {
        let (ledger, faucet) = setup(1.0);
        let response = app(state(&ledger, &faucet))
            .oneshot(Request::get("/fund-manager/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["fund_manager"]["running"], false);
        assert!(json["fund_manager"]["next_cycle_at_ms"].is_null());
        assert!(json["timestamp_ms"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_trigger_is_accepted() {
        let (ledger, faucet) = setup(1.0);
        let response = app(state(&ledger, &faucet))
            .oneshot(
                Request::post("/fund-manager/trigger")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().contains_key("x-request-id"));
        let json = body_json(response).await;
        assert_eq!(json["status"], "triggered");
    }

    #[tokio::test]
    async fn test_health_reports_wallet() {
        let (ledger, faucet) = setup(1.0);
        let state = state(&ledger, &faucet);
        let wallet = state.wallet.pubkey().to_string();
        let response = app(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["wallet"], wallet);
        assert_eq!(json["rpc_status"], "ok");
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let (ledger, faucet) = setup(1.0);
        let response = app(state(&ledger, &faucet))
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("relayer_maintenance_running 0"));
    }

    #[tokio::test]
    async fn test_guarded_route_passes_when_solvent() {
        let (ledger, faucet) = setup(1.0);
        let response = app(state(&ledger, &faucet))
            .oneshot(
                Request::post("/relay")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "abc-123");
        assert_eq!(faucet.calls(), 0);
    }

    #[tokio::test]
    async fn test_guarded_route_denied_when_insolvent() {
        let (ledger, faucet) = setup(0.01);
        faucet.fail(true);
        let response = app(state(&ledger, &faucet))
            .oneshot(Request::post("/relay").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], crate::admission::OUT_OF_FUNDS_REASON);
        assert_eq!(faucet.calls(), 1);
    }

    #[tokio::test]
    async fn test_unguarded_routes_skip_gate() {
        let (ledger, faucet) = setup(0.01);
        faucet.fail(true);
        let response = app(state(&ledger, &faucet))
            .oneshot(Request::get("/fund-manager/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(faucet.calls(), 0);
    }
}
