/*
 * Responsibility
 * - tracing 初期化 / panic hook
 * - Config読み込み → 依存生成 (introspector) → Router 組み立て
 * - Middleware の適用 (request-id / timeout / trace、保護ルートの introspection)
 * - axum::serve() で起動
 */
use std::{panic, process, time::Duration};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    middleware,
    services::introspection::build_introspector,
    state::{AppState, GuardSettings},
};

// introspection 1 回分の待ち時間に上乗せする余裕
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,resource_guard=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development では即座に落として気付けるようにする
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting resource server in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let introspector = build_introspector(&config)?;
    let state = AppState::new(introspector, GuardSettings::from_config(&config));

    let timeout = Duration::from_millis(config.introspection_timeout_ms) + REQUEST_TIMEOUT_MARGIN;
    let app = build_router(state, timeout);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState, timeout: Duration) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    middleware::http::apply(router, timeout)
}
