use super::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the price store is loaded; reports how much history it holds.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let points = state.store.history().await.len();
    Json(serde_json::json!({
        "status": "ready",
        "pricePoints": points,
    }))
}
