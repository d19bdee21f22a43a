use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{PricePoint, Symbol};
use crate::error::AppError;
use crate::pricing::PriceQuote;

#[derive(Debug, Serialize)]
pub struct PriceHistoryResponse {
    pub data: Vec<PricePoint>,
}

/// All cached daily price points, newest first.
pub async fn get_price_history(
    State(state): State<AppState>,
) -> Result<Json<PriceHistoryResponse>, AppError> {
    let data = state.store.history().await;
    Ok(Json(PriceHistoryResponse { data }))
}

#[derive(Debug, Deserialize)]
pub struct LivePriceQuery {
    pub symbol: String,
}

pub async fn get_live_price(
    Query(params): Query<LivePriceQuery>,
    State(state): State<AppState>,
) -> Result<Json<PriceQuote>, AppError> {
    let symbol = params.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::BadRequest("symbol must not be empty".to_string()));
    }

    let quote = state
        .live
        .spot_usd(&Symbol::new(symbol))
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?;
    Ok(Json(quote))
}
