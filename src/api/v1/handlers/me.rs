/*
 * Responsibility
 * - GET /me (保護対象)
 * - introspection を通過したリクエストの認証済みコンテキストをそのまま返す
 */
use axum::Json;

use crate::api::v1::{dto::me::MeResponse, extractors::AuthCtxExtractor};

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<MeResponse> {
    tracing::debug!(subject = ?ctx.subject, client_id = ctx.client_id, "me");
    Json(MeResponse::from(ctx))
}
