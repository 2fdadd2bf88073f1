/*
 * Responsibility
 * - GET /health (疎通用、introspection は通さない)
 * - 外部の認可サーバには問い合わせない (プロセスが生きているかだけを見る)
 */
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "introspection": state.introspector.backend_name(),
        })),
    )
}
