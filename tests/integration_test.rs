use axum::http::StatusCode;
use navscope::api::{self, AppState};
use navscope::config::Config;
use navscope::datasource::{MockLedgerSource, MockNavSource, MockPriceSource};
use navscope::domain::{Address, AssetBook, Decimal, Symbol};
use navscope::engine::normalizer::raw_event;
use navscope::engine::Market;
use navscope::orchestration::Reconstructor;
use navscope::pricing::{DailyValuationMerger, LivePriceService, PricePointStore};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn sym(s: &str) -> Symbol {
    Symbol::new(s.to_string())
}

fn test_config(cache_path: &str) -> Config {
    Config {
        port: 0,
        ledger_rpc_url: "http://example.invalid".to_string(),
        price_api_url: "http://example.invalid".to_string(),
        price_cache_path: cache_path.to_string(),
        fund_address: Some("0xfund".to_string()),
        pool_module: "pool".to_string(),
        quote_asset: "USDC".to_string(),
        base_asset: "SUI".to_string(),
        fee_asset: "DEEP".to_string(),
        shares_outstanding: dec("998942"),
        page_limit: 50,
        page_delay_ms: 0,
        candle_feed_path: None,
    }
}

async fn setup_test_app(ledger: MockLedgerSource) -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let cache_path = temp_dir
        .path()
        .join("prices.json")
        .to_string_lossy()
        .to_string();
    let config = test_config(&cache_path);

    let store = Arc::new(PricePointStore::open(&cache_path).await.unwrap());
    let prices = Arc::new(
        MockPriceSource::new()
            .with_price("SUI", dec("1.5"))
            .with_price("DEEP", dec("0.2")),
    );
    let live = LivePriceService::new(prices, sym("USDC"));
    let market = Market::new(
        config.pool_module.clone(),
        sym("USDC"),
        sym("SUI"),
        sym("DEEP"),
    );

    let reconstructor = Reconstructor::new(
        Arc::new(ledger),
        store.clone(),
        live.clone(),
        market,
        AssetBook::mainnet(),
        config.page_limit,
        Duration::from_millis(config.page_delay_ms),
        config.shares_outstanding,
    );

    let merger = DailyValuationMerger::new(
        store.clone(),
        live.clone(),
        Arc::new(MockNavSource::new(dec("50000"))),
        config.fund_address.clone().map(Address::new),
        vec![sym("SUI"), sym("DEEP")],
        config.shares_outstanding,
    );

    let state = AppState::new(config, reconstructor, store, live, merger);
    (api::create_router(state), temp_dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp) = setup_test_app(MockLedgerSource::new()).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint_reports_store_size() {
    let (app, _temp) = setup_test_app(MockLedgerSource::new()).await;

    let response = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["pricePoints"], 0);
}

#[tokio::test]
async fn test_trades_endpoint_reconstructs_closed_trade() {
    let account = "0xfund";
    let sui = "0x2::sui::SUI";
    let usdc = "0xa1::usdc::USDC";

    // Newest first: buy-back leg, then the earlier sell leg.
    let ledger = MockLedgerSource::new().with_events(vec![
        raw_event("0xnew", 2000, "pool", "Deposit", usdc, 120_000_000, account),
        raw_event("0xnew", 2000, "pool", "Withdraw", sui, 40_000_000_000, account),
        raw_event("0xold", 1000, "pool", "Withdraw", usdc, 150_000_000, account),
        raw_event("0xold", 1000, "pool", "Deposit", sui, 40_000_000_000, account),
    ]);

    let (app, _temp) = setup_test_app(ledger).await;

    let response = app
        .oneshot(get("/v1/trades?address=0xfund&fromMs=0&toMs=10000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let trades = body["trades"].as_array().unwrap();
    assert_eq!(trades.len(), 1);

    let trade = &trades[0];
    assert_eq!(trade["status"], "closed");
    assert_eq!(trade["id"], "0xnew");
    assert!((trade["exitPrice"].as_f64().unwrap() - 3.0).abs() < 1e-9);
    assert!((trade["entryPrice"].as_f64().unwrap() - 3.75).abs() < 1e-9);
    assert!((trade["realizedPnlPct"].as_f64().unwrap() - 20.0).abs() < 1e-9);
    assert!((trade["realizedPnlUsd"].as_f64().unwrap() - 30.0).abs() < 1e-9);

    let stats = &body["stats"];
    assert_eq!(stats["closedTrades"], 1);
    assert_eq!(stats["winningTrades"], 1);
    assert!((stats["winRatePct"].as_f64().unwrap() - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_trades_endpoint_defaults_to_fund_address() {
    let account = "0xfund";
    let ledger = MockLedgerSource::new().with_events(vec![raw_event(
        "0xonly",
        1000,
        "pool",
        "Deposit",
        "0xa1::usdc::USDC",
        120_000_000,
        account,
    )]);
    let (app, _temp) = setup_test_app(ledger).await;

    let response = app.oneshot(get("/v1/trades")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trades_endpoint_rejects_inverted_window() {
    let (app, _temp) = setup_test_app(MockLedgerSource::new()).await;

    let response = app
        .oneshot(get("/v1/trades?fromMs=5000&toMs=1000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_live_price_endpoint() {
    let (app, _temp) = setup_test_app(MockLedgerSource::new()).await;

    let response = app
        .oneshot(get("/v1/prices/live?symbol=SUI"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!((body["price"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    assert_eq!(body["stale"], false);
}

#[tokio::test]
async fn test_valuation_refresh_then_history() {
    let (app, _temp) = setup_test_app(MockLedgerSource::new()).await;

    let refresh = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/valuation/refresh")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(refresh).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!((body["merged"]["fundsUsd"].as_f64().unwrap() - 50000.0).abs() < 1e-6);

    let response = app.oneshot(get("/v1/prices/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert!((data[0]["prices"]["SUI"].as_f64().unwrap() - 1.5).abs() < 1e-9);
}
