/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - introspector: 外部の認可サーバへの問い合わせ口
 *   - guard: 保護対象ルートに共通の要求 (scope など)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::services::introspection::{AccessRequirement, Introspector};

/// Settings the access middleware applies to every protected route.
#[derive(Clone, Debug, Default)]
pub struct GuardSettings {
    pub requirement: AccessRequirement,
    pub public_base_url: Option<String>,
}

impl GuardSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            requirement: AccessRequirement::new(config.required_scopes.iter().cloned()),
            public_base_url: config.public_base_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub introspector: Arc<dyn Introspector>,
    pub guard: Arc<GuardSettings>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("introspector", &self.introspector.backend_name())
            .field("guard", &self.guard)
            .finish()
    }
}

impl AppState {
    pub fn new(introspector: Arc<dyn Introspector>, guard: GuardSettings) -> Self {
        Self {
            introspector,
            guard: Arc::new(guard),
        }
    }
}
