//! Factory: build the `Introspector` from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, IntrospectionStyle};
use crate::error::AppError;
use crate::services::introspection::Introspector;
use crate::services::introspection::http::{
    ActionIntrospector, ClientCredentials, Rfc7662Introspector,
};

pub fn build_introspector(config: &Config) -> Result<Arc<dyn Introspector>, AppError> {
    let credentials = match (&config.introspection_client_id, &config.introspection_client_secret) {
        (Some(id), Some(secret)) => Some(ClientCredentials {
            id: id.clone(),
            secret: secret.clone(),
        }),
        _ => None,
    };
    let url = config.introspection_endpoint.clone();
    let timeout = Duration::from_millis(config.introspection_timeout_ms);

    let introspector: Arc<dyn Introspector> = match config.introspection_style {
        IntrospectionStyle::Action => Arc::new(ActionIntrospector::new(url, credentials, timeout)?),
        IntrospectionStyle::Rfc7662 => {
            Arc::new(Rfc7662Introspector::new(url, credentials, timeout)?)
        }
    };

    tracing::info!(
        backend = introspector.backend_name(),
        endpoint = %config.introspection_endpoint,
        "introspection client ready"
    );

    Ok(introspector)
}
