pub mod health;
pub mod prices;
pub mod trades;
pub mod valuation;

use crate::config::Config;
use crate::orchestration::Reconstructor;
use crate::pricing::{DailyValuationMerger, LivePriceService, PricePointStore};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub reconstructor: Reconstructor,
    pub store: Arc<PricePointStore>,
    pub live: LivePriceService,
    pub merger: DailyValuationMerger,
}

impl AppState {
    pub fn new(
        config: Config,
        reconstructor: Reconstructor,
        store: Arc<PricePointStore>,
        live: LivePriceService,
        merger: DailyValuationMerger,
    ) -> Self {
        Self {
            config,
            reconstructor,
            store,
            live,
            merger,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/trades", get(trades::get_trades))
        .route("/v1/prices/history", get(prices::get_price_history))
        .route("/v1/prices/live", get(prices::get_live_price))
        .route("/v1/valuation/refresh", post(valuation::refresh_valuation))
        .layer(cors)
        .with_state(state)
}
