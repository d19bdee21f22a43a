use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::domain::PricePoint;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ValuationResponse {
    pub merged: PricePoint,
}

/// Run the daily valuation merge once, on demand.
pub async fn refresh_valuation(
    State(state): State<AppState>,
) -> Result<Json<ValuationResponse>, AppError> {
    let merged = state.merger.refresh().await?;
    Ok(Json(ValuationResponse { merged }))
}
