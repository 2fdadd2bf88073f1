/*
 * Responsibility
 * - アプリ共通の AppError 定義 (introspection client の生成失敗 / 認証以外の handler エラー)
 * - 設定の読み込み失敗 (ConfigError) は app::run から anyhow でそのまま返す
 * - IntoResponse 実装 (HTTP status / JSON error body)
 *
 * Notes
 * - 認証結果 (400/401/403/500) はエラーではなくデータ (Action) として扱う
 *   → middleware::auth::rejection を参照
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::introspection::IntrospectionError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("introspection client setup failed: {0}")]
    Introspection(#[from] IntrospectionError),
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // 内部の詳細はログにだけ残す
        tracing::error!(error = %self, "request failed");

        let body = ErrorResponse::new("INTERNAL_SERVER_ERROR", "internal server error");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
