//! Access-token guard for OAuth 2.0 resource servers.
//!
//! - `services::auth::credential`: `Authorization` ヘッダ (Bearer / DPoP) から token を取り出す
//! - `services::introspection`: introspection の結果を 5 つの Action に分類し、
//!   status code と `WWW-Authenticate` を決める
//! - `middleware::auth::access`: 上の 2 つを axum の middleware として組み合わせる
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
