use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": {
            "openai": state.designer.is_some(),
            "fal": state.fal_try_on.is_some(),
        },
        "orders": state.orders.len(),
    }))
}
