/*
 * Responsibility
 * - 環境変数や設定の読み込み (introspection endpoint、必須 scope など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// How the introspection endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionStyle {
    /// The authorization service returns the action and challenge itself.
    Action,
    /// RFC 7662 response; the action is decided locally.
    Rfc7662,
}

impl FromStr for IntrospectionStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "action" => Ok(Self::Action),
            "rfc7662" => Ok(Self::Rfc7662),
            _ => Err(ConfigError::Invalid("INTROSPECTION_STYLE")),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub introspection_endpoint: Url,
    pub introspection_style: IntrospectionStyle,
    pub introspection_client_id: Option<String>,
    pub introspection_client_secret: Option<String>,
    pub introspection_timeout_ms: u64,

    pub required_scopes: Vec<String>,
    pub public_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (env, test fixtures).
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match var("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let introspection_endpoint = var("INTROSPECTION_ENDPOINT")
            .ok_or(ConfigError::Missing("INTROSPECTION_ENDPOINT"))
            .and_then(|v| {
                Url::parse(v.trim()).map_err(|_| ConfigError::Invalid("INTROSPECTION_ENDPOINT"))
            })?;

        let introspection_style = match var("INTROSPECTION_STYLE") {
            Some(v) => v.parse()?,
            None => IntrospectionStyle::Action,
        };

        let introspection_client_id = var("INTROSPECTION_CLIENT_ID").filter(|s| !s.is_empty());
        let introspection_client_secret =
            var("INTROSPECTION_CLIENT_SECRET").filter(|s| !s.is_empty());

        // id だけ/secret だけの設定は誤設定とみなす
        if introspection_client_id.is_some() != introspection_client_secret.is_some() {
            return Err(ConfigError::Missing(
                "INTROSPECTION_CLIENT_ID / INTROSPECTION_CLIENT_SECRET",
            ));
        }

        let introspection_timeout_ms = var("INTROSPECTION_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);

        let required_scopes = var("REQUIRED_SCOPES")
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let public_base_url = var("PUBLIC_BASE_URL").filter(|s| !s.trim().is_empty());

        Ok(Self {
            addr,
            app_env,
            introspection_endpoint,
            introspection_style,
            introspection_client_id,
            introspection_client_secret,
            introspection_timeout_ms,
            required_scopes,
            public_base_url,
        })
    }
}
