//! access token (Bearer / DPoP) → introspection → AuthCtx を extensions に入れる
//!
//! 流れ:
//! 1. `Authorization` ヘッダから token を取り出す (DPoP → Bearer の順に試す)
//!    - 取り出せなければ introspection を呼ばずに 400
//! 2. 外部の認可サーバに introspection を依頼する
//!    - 問い合わせ自体の失敗は 500
//! 3. 返ってきた Action で分岐する (400/401/403/500 は拒否、OK なら handler へ)

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::middleware::auth::rejection::AuthRejection;
use crate::services::auth::{credential, dpop};
use crate::services::introspection::{Action, IntrospectionOutcome, IntrospectionRequest, derive};
use crate::state::AppState;

/// 保護対象のルートに introspection を掛ける。
///
/// 例：
/// ```ignore
/// let protected = Router::new().route("/me", get(me));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthRejection> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let credential = credential::extract_any(header_value);
    let scheme = credential.map(|(scheme, _)| scheme);

    let proof = dpop::context(
        req.headers(),
        req.method(),
        &original_uri,
        state.guard.public_base_url.as_deref(),
    );
    let requirement = &state.guard.requirement;
    let introspector = Arc::clone(&state.introspector);

    let outcome = derive(credential.map(|(_, token)| token), requirement, |token| {
        let request = IntrospectionRequest::new(token, requirement)
            .with_scheme(scheme)
            .with_dpop(proof);
        async move { introspector.introspect(&request).await }
    })
    .await;

    tracing::debug!(summary = %outcome.summarize(), "introspection verdict");

    match outcome.action() {
        Action::Ok => {}
        Action::InternalServerError => {
            tracing::error!(
                backend = state.introspector.backend_name(),
                result_code = outcome.result_code(),
                result_message = outcome.result_message(),
                "introspection could not decide"
            );
            return Err(AuthRejection(outcome));
        }
        Action::BadRequest | Action::Unauthorized | Action::Forbidden => {
            tracing::info!(action = %outcome.action(), scheme = ?scheme, "access token rejected");
            return Err(AuthRejection(outcome));
        }
    }

    // OK は credential がある場合にしか返らない
    let Some(scheme) = scheme else {
        return Err(AuthRejection(IntrospectionOutcome::missing_credential()));
    };
    let auth_ctx = AuthCtx::from_outcome(scheme, &outcome);

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}
