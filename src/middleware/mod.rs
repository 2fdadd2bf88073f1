/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: introspection による保護 / http: request-id・timeout・trace など横断的な関心事
 */
pub mod auth;
pub mod http;
