//! HTTP clients for the introspection boundary.
//!
//! - `ActionIntrospector`: the authorization service decides the action and
//!   answers with the outcome JSON itself.
//! - `Rfc7662Introspector`: a plain RFC 7662 endpoint answers `active`/`scope`/...
//!   and the action is decided locally (`classify`).
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use url::Url;

use super::action::Action;
use super::classify::{TokenFacts, classify};
use super::client::{IntrospectionError, IntrospectionRequest, Introspector};
use super::outcome::IntrospectionOutcome;
use crate::services::auth::{BearerChallenge, ErrorCode, Scheme};

/// Basic-auth credentials of this resource server at the authorization service.
#[derive(Clone)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the secret
        f.debug_struct("ClientCredentials")
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Endpoint {
    http: HttpClient,
    url: Url,
    credentials: Option<ClientCredentials>,
}

impl Endpoint {
    fn new(
        url: Url,
        credentials: Option<ClientCredentials>,
        timeout: Duration,
    ) -> Result<Self, IntrospectionError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            http,
            url,
            credentials,
        })
    }

    fn post(&self) -> RequestBuilder {
        let builder = self.http.post(self.url.clone());
        match &self.credentials {
            Some(c) => builder.basic_auth(&c.id, Some(&c.secret)),
            None => builder,
        }
    }

    async fn send<T>(&self, builder: RequestBuilder) -> Result<T, IntrospectionError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntrospectionError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| IntrospectionError::Decode(e.to_string()))
    }
}

/// Posts the request as JSON and decodes the returned outcome as-is.
#[derive(Debug, Clone)]
pub struct ActionIntrospector {
    endpoint: Endpoint,
}

impl ActionIntrospector {
    pub fn new(
        url: Url,
        credentials: Option<ClientCredentials>,
        timeout: Duration,
    ) -> Result<Self, IntrospectionError> {
        Ok(Self {
            endpoint: Endpoint::new(url, credentials, timeout)?,
        })
    }
}

#[async_trait]
impl Introspector for ActionIntrospector {
    fn backend_name(&self) -> &'static str {
        "action"
    }

    async fn introspect(
        &self,
        request: &IntrospectionRequest,
    ) -> Result<IntrospectionOutcome, IntrospectionError> {
        let outcome: IntrospectionOutcome =
            self.endpoint.send(self.endpoint.post().json(request)).await?;

        if let (Some(code), Some(message)) = (outcome.result_code(), outcome.result_message()) {
            tracing::debug!(result_code = %code, result_message = %message, "introspection result");
        }

        Ok(outcome)
    }
}

/// Standard token introspection (RFC 7662) with local classification.
///
/// A plain RFC 7662 endpoint cannot verify DPoP proofs, so tokens presented
/// with the DPoP scheme or bound to a DPoP key (`cnf.jkt`) are rejected as
/// `invalid_token`.
#[derive(Debug, Clone)]
pub struct Rfc7662Introspector {
    endpoint: Endpoint,
}

impl Rfc7662Introspector {
    pub fn new(
        url: Url,
        credentials: Option<ClientCredentials>,
        timeout: Duration,
    ) -> Result<Self, IntrospectionError> {
        Ok(Self {
            endpoint: Endpoint::new(url, credentials, timeout)?,
        })
    }
}

#[async_trait]
impl Introspector for Rfc7662Introspector {
    fn backend_name(&self) -> &'static str {
        "rfc7662"
    }

    async fn introspect(
        &self,
        request: &IntrospectionRequest,
    ) -> Result<IntrospectionOutcome, IntrospectionError> {
        let form = [
            ("token", request.token.as_str()),
            ("token_type_hint", "access_token"),
        ];
        let response: Rfc7662Response = self.endpoint.send(self.endpoint.post().form(&form)).await?;

        Ok(response.decide(request, Utc::now().timestamp()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Rfc7662Response {
    active: bool,
    scope: Option<String>,
    client_id: Option<String>,
    sub: Option<String>,
    exp: Option<i64>,
    aud: Option<Audience>,
    cnf: Option<Confirmation>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Confirmation {
    #[serde(rename = "x5t#S256")]
    x5t_s256: Option<String>,
    // DPoP 公開鍵の thumbprint (RFC 9449)
    jkt: Option<String>,
}

impl Rfc7662Response {
    fn is_dpop_bound(&self) -> bool {
        self.cnf.as_ref().is_some_and(|c| c.jkt.is_some())
    }

    fn decide(self, request: &IntrospectionRequest, now: i64) -> IntrospectionOutcome {
        let requires_proof = self.is_dpop_bound() || request.scheme == Some(Scheme::DPoP);
        let outcome = classify(self.into_facts(now), &request.requirement());

        if !requires_proof || !outcome.is_existent() {
            return outcome;
        }

        tracing::warn!(
            has_proof = request.dpop.is_some(),
            "DPoP-bound token cannot be verified through RFC 7662 introspection"
        );
        let challenge = BearerChallenge::new(ErrorCode::InvalidToken)
            .description("The DPoP proof cannot be verified for this access token.");
        outcome
            .rebuild(Action::Unauthorized)
            .usable(false)
            .response_content(challenge.to_string())
            .build()
    }

    fn into_facts(self, now: i64) -> TokenFacts {
        // 数値でない client_id は alias として保持する
        let (client_id, client_id_alias) = match self.client_id {
            Some(id) => match id.parse::<u64>() {
                Ok(n) => (n, None),
                Err(_) => (0, Some(id)),
            },
            None => (0, None),
        };

        let audience: Vec<Url> = match self.aud {
            Some(Audience::One(a)) => vec![a],
            Some(Audience::Many(a)) => a,
            None => Vec::new(),
        }
        .iter()
        .filter_map(|a| Url::parse(a).ok())
        .collect();

        TokenFacts {
            existent: self.active,
            usable: self.active && self.exp.is_none_or(|exp| exp > now),
            refreshable: false,
            client_id,
            client_id_alias,
            subject: self.sub,
            scopes: self
                .scope
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            expires_at: self.exp.map(|exp| exp.saturating_mul(1000)).unwrap_or(0),
            certificate_thumbprint: self.cnf.and_then(|c| c.x5t_s256),
            resources: audience.iter().cloned().collect(),
            access_token_resources: audience.into_iter().collect(),
            properties: Vec::new(),
        }
    }
}
