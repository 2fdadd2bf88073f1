/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が introspection の結果 (Action::Ok) から組み立てて request extensions に格納し、
 *   handler はこの型だけを受け取る
 *
 * Notes
 * - token の検証そのものは外部の認可サーバの責務
 * - ここは「型（契約）」として固定化する
 */
use chrono::{DateTime, Utc};

use crate::services::auth::Scheme;
use crate::services::introspection::IntrospectionOutcome;

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `subject` は resource owner。client credentials で発行された token では None
/// - `scopes` は token に付与された scope（coarse-grained。細かい認可は handler 側で）
/// - `certificate_thumbprint` は mTLS binding (x5t#S256)。ログ相関用
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub scheme: Scheme,
    pub subject: Option<String>,
    pub client_id: u64,
    pub client_id_alias: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub certificate_thumbprint: Option<String>,
}

impl AuthCtx {
    pub fn from_outcome(scheme: Scheme, outcome: &IntrospectionOutcome) -> Self {
        Self {
            scheme,
            subject: outcome.subject().map(str::to_string),
            client_id: outcome.client_id(),
            client_id_alias: outcome.client_id_alias().map(str::to_string),
            scopes: outcome
                .scopes()
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            expires_at: outcome.expires_at(),
            certificate_thumbprint: outcome.certificate_thumbprint().map(str::to_string),
        }
    }
}
