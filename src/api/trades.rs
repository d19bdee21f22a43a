use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{Address, Decimal, TimeMs, Trade, TradeStatus};
use crate::engine::TradeStats;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesQuery {
    pub address: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesResponse {
    pub trades: Vec<TradeDto>,
    pub stats: TradeStats,
    pub events_fetched: usize,
}

/// Wire shape of one reconstructed trade. Leg details stay internal; the
/// dashboard only charts the priced summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub id: String,
    pub status: TradeStatus,
    pub exit_time_ms: i64,
    pub exit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
    pub fee_usd: Decimal,
    pub realized_pnl_usd: Decimal,
    pub realized_pnl_pct: Decimal,
    pub buy_leg_count: usize,
    pub sell_leg_count: usize,
}

impl From<&Trade> for TradeDto {
    fn from(trade: &Trade) -> Self {
        TradeDto {
            id: trade.id.as_str().to_string(),
            status: trade.status,
            exit_time_ms: trade.exit_time_ms.as_ms(),
            exit_price: trade.exit_price,
            entry_time_ms: trade.entry_time_ms.map(|t| t.as_ms()),
            entry_price: trade.entry_price,
            fee_usd: trade.fee_usd,
            realized_pnl_usd: trade.realized_pnl_usd,
            realized_pnl_pct: trade.realized_pnl_pct,
            buy_leg_count: trade.buy_legs.len(),
            sell_leg_count: trade.sell_legs.len(),
        }
    }
}

pub async fn get_trades(
    Query(params): Query<TradesQuery>,
    State(state): State<AppState>,
) -> Result<Json<TradesResponse>, AppError> {
    let address = resolve_address(&params, &state)?;
    let from_ms = TimeMs::new(params.from_ms.unwrap_or(0));
    let to_ms = params.to_ms.map(TimeMs::new).unwrap_or_else(TimeMs::now);

    if from_ms > to_ms {
        return Err(AppError::BadRequest(
            "fromMs must not exceed toMs".to_string(),
        ));
    }

    let result = state
        .reconstructor
        .reconstruct(&address, from_ms, to_ms)
        .await?;

    Ok(Json(TradesResponse {
        trades: result.trades.iter().map(TradeDto::from).collect(),
        stats: result.stats,
        events_fetched: result.events_fetched,
    }))
}

fn resolve_address(params: &TradesQuery, state: &AppState) -> Result<Address, AppError> {
    let raw = params
        .address
        .clone()
        .filter(|a| !a.is_empty())
        .or_else(|| state.config.fund_address.clone())
        .ok_or_else(|| {
            AppError::BadRequest(
                "address query parameter required (no FUND_ADDRESS configured)".to_string(),
            )
        })?;
    if !raw.starts_with("0x") {
        return Err(AppError::BadRequest(format!(
            "invalid address: {}",
            raw
        )));
    }
    Ok(Address::new(raw))
}
