//! Introspection lookup interface used by the access middleware.
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::classify::AccessRequirement;
use super::outcome::IntrospectionOutcome;
use crate::services::auth::Scheme;
use crate::services::auth::dpop::DpopContext;

/// Lookup-layer errors (transport/status/decoding).
///
/// None of these is the client's fault: callers turn every variant into
/// `IntrospectionOutcome::lookup_failed()`.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("introspection transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("introspection endpoint returned status {0}")]
    Status(u16),
    #[error("invalid introspection response: {0}")]
    Decode(String),
}

/// What is sent to the authorization service for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionRequest {
    pub token: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    /// Scheme the token was presented with. Not sent.
    #[serde(skip)]
    pub scheme: Option<Scheme>,
}

impl IntrospectionRequest {
    pub fn new(token: impl Into<String>, requirement: &AccessRequirement) -> Self {
        Self {
            token: token.into(),
            scopes: requirement.scopes.clone(),
            subject: requirement.subject.clone(),
            ..Self::default()
        }
    }

    pub fn with_scheme(mut self, scheme: Option<Scheme>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_dpop(mut self, dpop: Option<DpopContext>) -> Self {
        if let Some(ctx) = dpop {
            self.dpop = Some(ctx.proof);
            self.htm = Some(ctx.htm);
            self.htu = Some(ctx.htu);
        }
        self
    }

    pub fn requirement(&self) -> AccessRequirement {
        AccessRequirement {
            scopes: self.scopes.clone(),
            subject: self.subject.clone(),
        }
    }
}

/// Token introspection against an external authorization service.
///
/// Implementations must be shareable across requests (`Arc<dyn Introspector>`).
#[async_trait]
pub trait Introspector: Send + Sync + 'static {
    // Backend name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn introspect(
        &self,
        request: &IntrospectionRequest,
    ) -> Result<IntrospectionOutcome, IntrospectionError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_only_present_fields() {
        let requirement = AccessRequirement::new(["profile"]);
        let request = IntrospectionRequest::new("abc", &requirement)
            .with_scheme(Some(Scheme::DPoP))
            .with_dpop(Some(DpopContext {
                proof: "eyJ.proof".to_string(),
                htm: "GET".to_string(),
                htu: "https://rs.example.com/api/v1/me".to_string(),
            }));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "token": "abc",
                "scopes": ["profile"],
                "dpop": "eyJ.proof",
                "htm": "GET",
                "htu": "https://rs.example.com/api/v1/me"
            })
        );
    }

    #[test]
    fn requirement_round_trips_scopes_and_subject() {
        let requirement = AccessRequirement::new(["a", "b"]).with_subject("john");
        let request = IntrospectionRequest::new("abc", &requirement).with_dpop(None);

        assert_eq!(request.requirement(), requirement);
        assert_eq!(request.dpop, None);
    }
}
