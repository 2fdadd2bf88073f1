/*
 * Responsibility
 * - GET /me の response DTO
 */
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::v1::extractors::AuthCtx;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub scheme: &'static str,
    pub subject: Option<String>,
    pub client_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id_alias: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// mTLS で bind された token の場合のみ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_thumbprint: Option<String>,
}

impl From<AuthCtx> for MeResponse {
    fn from(ctx: AuthCtx) -> Self {
        Self {
            scheme: ctx.scheme.keyword(),
            subject: ctx.subject,
            client_id: ctx.client_id,
            client_id_alias: ctx.client_id_alias,
            scopes: ctx.scopes,
            expires_at: ctx.expires_at,
            certificate_thumbprint: ctx.certificate_thumbprint,
        }
    }
}
