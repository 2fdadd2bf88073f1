/*
 * Responsibility
 * - introspection の判定結果 (IntrospectionOutcome) の型
 * - 認可サーバの JSON (camelCase) からの復元と、ローカルで組み立てる builder
 * - 不変条件 (responseContent 非空 / accessTokenResources ⊆ resources) はここで保証する
 *
 * Notes
 * - 一度組み立てたら変更しない (フィールドは private、accessor のみ公開)
 */
use std::collections::BTreeSet;
use std::fmt::Write as _;

use axum::http::StatusCode;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use url::Url;

use super::action::Action;

/// Arbitrary key/value attached to the token at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub hidden: bool,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            hidden: false,
        }
    }
}

/// Rich authorization request payload (RFC 9396).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "AuthorizationDetailsWire")]
pub struct AuthorizationDetails {
    pub elements: Vec<AuthorizationDetailsElement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDetailsElement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub data_types: Vec<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub privileges: Vec<String>,
    /// API-specific members.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// RFC 9396 の生配列と `{"elements": [...]}` の両方を受ける
#[derive(Deserialize)]
#[serde(untagged)]
enum AuthorizationDetailsWire {
    Array(Vec<AuthorizationDetailsElement>),
    Wrapped {
        #[serde(default)]
        elements: Option<Vec<AuthorizationDetailsElement>>,
    },
}

impl From<AuthorizationDetailsWire> for AuthorizationDetails {
    fn from(wire: AuthorizationDetailsWire) -> Self {
        let elements = match wire {
            AuthorizationDetailsWire::Array(elements) => elements,
            AuthorizationDetailsWire::Wrapped { elements } => elements.unwrap_or_default(),
        };
        Self { elements }
    }
}

/// Verdict of one access-token introspection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "OutcomeWire")]
pub struct IntrospectionOutcome {
    action: Action,
    client_id: u64,
    subject: Option<String>,
    scopes: BTreeSet<String>,
    existent: bool,
    usable: bool,
    sufficient: bool,
    refreshable: bool,
    response_content: String,
    expires_at: i64,
    properties: Vec<Property>,
    client_id_alias: Option<String>,
    client_id_alias_used: bool,
    certificate_thumbprint: Option<String>,
    resources: BTreeSet<Url>,
    access_token_resources: BTreeSet<Url>,
    authorization_details: Option<AuthorizationDetails>,
    result_code: Option<String>,
    result_message: Option<String>,
}

impl IntrospectionOutcome {
    pub fn builder(action: Action) -> OutcomeBuilder {
        OutcomeBuilder::new(action)
    }

    /// Start over from this outcome with another action. The challenge is reset.
    pub fn rebuild(self, action: Action) -> OutcomeBuilder {
        OutcomeBuilder {
            draft: Self {
                action,
                response_content: String::new(),
                ..self
            },
        }
    }

    /// No credential was found in the request. The lookup is never performed.
    pub fn missing_credential() -> Self {
        Self::builder(Action::BadRequest).build()
    }

    /// The lookup failed for a reason the client is not responsible for.
    pub fn lookup_failed() -> Self {
        Self::builder(Action::InternalServerError).build()
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn status_code(&self) -> StatusCode {
        self.action.status_code()
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// `None` for tokens issued through the client credentials flow.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Granted scopes. `None` when the token does not exist.
    pub fn scopes(&self) -> Option<&BTreeSet<String>> {
        self.existent.then_some(&self.scopes)
    }

    pub fn is_existent(&self) -> bool {
        self.existent
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    pub fn is_sufficient(&self) -> bool {
        self.sufficient
    }

    /// `None` when the token does not exist.
    pub fn refreshable(&self) -> Option<bool> {
        self.existent.then_some(self.refreshable)
    }

    /// Precomputed RFC 6750 challenge. Never empty.
    pub fn response_content(&self) -> &str {
        &self.response_content
    }

    /// Value for the `WWW-Authenticate` header, if this action sends one.
    pub fn www_authenticate(&self) -> Option<&str> {
        match self.action {
            Action::InternalServerError => None,
            Action::BadRequest | Action::Unauthorized | Action::Forbidden | Action::Ok => {
                Some(&self.response_content)
            }
        }
    }

    /// Expiry in epoch milliseconds. `None` when the token does not exist.
    pub fn expires_at_millis(&self) -> Option<i64> {
        self.existent.then_some(self.expires_at)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at_millis()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn client_id_alias(&self) -> Option<&str> {
        self.client_id_alias.as_deref()
    }

    pub fn client_id_alias_used(&self) -> bool {
        self.client_id_alias_used
    }

    /// Mutual-TLS binding (`x5t#S256`).
    pub fn certificate_thumbprint(&self) -> Option<&str> {
        self.certificate_thumbprint.as_deref()
    }

    pub fn resources(&self) -> &BTreeSet<Url> {
        &self.resources
    }

    /// Always a subset of `resources()`.
    pub fn access_token_resources(&self) -> &BTreeSet<Url> {
        &self.access_token_resources
    }

    pub fn authorization_details(&self) -> Option<&AuthorizationDetails> {
        self.authorization_details.as_ref()
    }

    pub fn result_code(&self) -> Option<&str> {
        self.result_code.as_deref()
    }

    pub fn result_message(&self) -> Option<&str> {
        self.result_message.as_deref()
    }

    /// One-line rendering for logs. Hidden property values are masked.
    pub fn summarize(&self) -> String {
        let scopes = self.scopes.iter().cloned().collect::<Vec<_>>().join(" ");

        let mut properties = String::new();
        for (i, p) in self.properties.iter().enumerate() {
            if i > 0 {
                properties.push(',');
            }
            let value = if p.hidden { "***" } else { p.value.as_str() };
            let _ = write!(properties, "{}={}", p.key, value);
        }

        format!(
            "action={}, clientId={}, subject={}, existent={}, usable={}, sufficient={}, \
             refreshable={}, expiresAt={}, scopes={}, properties={}, clientIdAlias={}, \
             clientIdAliasUsed={}, confirmation={}",
            self.action,
            self.client_id,
            self.subject.as_deref().unwrap_or("null"),
            self.existent,
            self.usable,
            self.sufficient,
            self.refreshable,
            self.expires_at,
            scopes,
            properties,
            self.client_id_alias.as_deref().unwrap_or("null"),
            self.client_id_alias_used,
            self.certificate_thumbprint.as_deref().unwrap_or("null"),
        )
    }
}

/// Assembles an [`IntrospectionOutcome`]; invariants are applied by `build`.
#[derive(Debug, Clone)]
pub struct OutcomeBuilder {
    draft: IntrospectionOutcome,
}

impl OutcomeBuilder {
    fn new(action: Action) -> Self {
        Self {
            draft: IntrospectionOutcome {
                action,
                client_id: 0,
                subject: None,
                scopes: BTreeSet::new(),
                existent: false,
                usable: false,
                sufficient: false,
                refreshable: false,
                response_content: String::new(),
                expires_at: 0,
                properties: Vec::new(),
                client_id_alias: None,
                client_id_alias_used: false,
                certificate_thumbprint: None,
                resources: BTreeSet::new(),
                access_token_resources: BTreeSet::new(),
                authorization_details: None,
                result_code: None,
                result_message: None,
            },
        }
    }

    pub fn client_id(mut self, client_id: u64) -> Self {
        self.draft.client_id = client_id;
        self
    }

    pub fn subject(mut self, subject: Option<String>) -> Self {
        self.draft.subject = subject;
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn existent(mut self, existent: bool) -> Self {
        self.draft.existent = existent;
        self
    }

    pub fn usable(mut self, usable: bool) -> Self {
        self.draft.usable = usable;
        self
    }

    pub fn sufficient(mut self, sufficient: bool) -> Self {
        self.draft.sufficient = sufficient;
        self
    }

    pub fn refreshable(mut self, refreshable: bool) -> Self {
        self.draft.refreshable = refreshable;
        self
    }

    pub fn response_content(mut self, content: impl Into<String>) -> Self {
        self.draft.response_content = content.into();
        self
    }

    pub fn expires_at(mut self, epoch_millis: i64) -> Self {
        self.draft.expires_at = epoch_millis;
        self
    }

    pub fn properties(mut self, properties: Vec<Property>) -> Self {
        self.draft.properties = properties;
        self
    }

    pub fn client_id_alias(mut self, alias: Option<String>, used: bool) -> Self {
        self.draft.client_id_alias = alias;
        self.draft.client_id_alias_used = used;
        self
    }

    pub fn certificate_thumbprint(mut self, thumbprint: Option<String>) -> Self {
        self.draft.certificate_thumbprint = thumbprint;
        self
    }

    pub fn resources(mut self, resources: impl IntoIterator<Item = Url>) -> Self {
        self.draft.resources = resources.into_iter().collect();
        self
    }

    pub fn access_token_resources(mut self, resources: impl IntoIterator<Item = Url>) -> Self {
        self.draft.access_token_resources = resources.into_iter().collect();
        self
    }

    pub fn authorization_details(mut self, details: Option<AuthorizationDetails>) -> Self {
        self.draft.authorization_details = details;
        self
    }

    pub fn result(mut self, code: Option<String>, message: Option<String>) -> Self {
        self.draft.result_code = code;
        self.draft.result_message = message;
        self
    }

    pub fn build(self) -> IntrospectionOutcome {
        let mut outcome = self.draft;

        // action は token の状態より緩くしない (存在しない/使えない → 401、scope 不足 → 403)
        let settled = settle(
            outcome.action,
            outcome.existent,
            outcome.usable,
            outcome.sufficient,
        );
        if settled != outcome.action {
            tracing::warn!(
                reported = %outcome.action,
                settled = %settled,
                "introspection action contradicts the token state"
            );
            outcome.action = settled;
            outcome.response_content = settled.default_challenge().to_string();
        }

        if outcome.response_content.trim().is_empty() {
            outcome.response_content = outcome.action.default_challenge().to_string();
        }

        // accessTokenResources は resources を狭めることはあっても広げない
        let resources = &outcome.resources;
        let before = outcome.access_token_resources.len();
        outcome
            .access_token_resources
            .retain(|resource| resources.contains(resource));
        let dropped = before - outcome.access_token_resources.len();
        if dropped > 0 {
            tracing::warn!(
                dropped,
                "access token resources outside the granted resources were ignored"
            );
        }

        outcome
    }
}

fn settle(action: Action, existent: bool, usable: bool, sufficient: bool) -> Action {
    match action {
        Action::Ok | Action::Forbidden if !existent || !usable => Action::Unauthorized,
        Action::Ok if !sufficient => Action::Forbidden,
        other => other,
    }
}

// 認可サーバの JSON 表現。配列は null で返ることがあるので Option で受ける
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OutcomeWire {
    action: Option<String>,
    client_id: u64,
    subject: Option<String>,
    scopes: Option<Vec<String>>,
    existent: bool,
    usable: bool,
    sufficient: bool,
    refreshable: bool,
    response_content: Option<String>,
    expires_at: i64,
    properties: Option<Vec<Property>>,
    client_id_alias: Option<String>,
    client_id_alias_used: bool,
    certificate_thumbprint: Option<String>,
    resources: Option<Vec<Url>>,
    access_token_resources: Option<Vec<Url>>,
    authorization_details: Option<AuthorizationDetails>,
    result_code: Option<String>,
    result_message: Option<String>,
}

impl From<OutcomeWire> for IntrospectionOutcome {
    fn from(wire: OutcomeWire) -> Self {
        // 未知/欠落の action はクライアント起因ではないので 500 扱い
        let action = match wire.action.as_deref().map(str::parse::<Action>) {
            Some(Ok(action)) => action,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "falling back to INTERNAL_SERVER_ERROR");
                Action::InternalServerError
            }
            None => {
                tracing::warn!("introspection response without action");
                Action::InternalServerError
            }
        };

        IntrospectionOutcome::builder(action)
            .client_id(wire.client_id)
            .subject(wire.subject)
            .scopes(wire.scopes.unwrap_or_default())
            .existent(wire.existent)
            .usable(wire.usable)
            .sufficient(wire.sufficient)
            .refreshable(wire.refreshable)
            .response_content(wire.response_content.unwrap_or_default())
            .expires_at(wire.expires_at)
            .properties(wire.properties.unwrap_or_default())
            .client_id_alias(wire.client_id_alias, wire.client_id_alias_used)
            .certificate_thumbprint(wire.certificate_thumbprint)
            .resources(wire.resources.unwrap_or_default())
            .access_token_resources(wire.access_token_resources.unwrap_or_default())
            .authorization_details(wire.authorization_details)
            .result(wire.result_code, wire.result_message)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: serde_json::Value) -> IntrospectionOutcome {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_ok_response() {
        let outcome = decode(json!({
            "resultCode": "A056001",
            "resultMessage": "[A056001] The access token is valid.",
            "action": "OK",
            "clientId": 57297408867u64,
            "subject": "john",
            "scopes": ["profile", "email"],
            "existent": true,
            "usable": true,
            "sufficient": true,
            "refreshable": true,
            "responseContent": "Bearer error=\"invalid_request\"",
            "expiresAt": 1_700_000_000_000i64,
            "properties": [
                { "key": "tenant", "value": "acme", "hidden": false },
                { "key": "secret", "value": "s3cr3t", "hidden": true }
            ],
            "clientIdAlias": "my-client",
            "clientIdAliasUsed": true,
            "certificateThumbprint": "A4DtL2JmUMhAsvJj5tKyn64SqzmuXbMrJa0n761y5v0"
        }));

        assert_eq!(outcome.action(), Action::Ok);
        assert_eq!(outcome.status_code(), StatusCode::OK);
        assert_eq!(outcome.client_id(), 57297408867);
        assert_eq!(outcome.subject(), Some("john"));
        assert_eq!(outcome.scopes().map(|s| s.len()), Some(2));
        assert_eq!(outcome.refreshable(), Some(true));
        assert_eq!(outcome.expires_at_millis(), Some(1_700_000_000_000));
        assert_eq!(
            outcome.expires_at().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(outcome.properties().len(), 2);
        assert_eq!(outcome.client_id_alias(), Some("my-client"));
        assert!(outcome.client_id_alias_used());
        assert_eq!(outcome.result_code(), Some("A056001"));
        assert_eq!(
            outcome.www_authenticate(),
            Some(r#"Bearer error="invalid_request""#)
        );
    }

    #[test]
    fn unknown_action_falls_back_to_internal_server_error() {
        let outcome = decode(json!({ "action": "TEAPOT" }));
        assert_eq!(outcome.action(), Action::InternalServerError);

        let outcome = decode(json!({ "subject": "john" }));
        assert_eq!(outcome.action(), Action::InternalServerError);
    }

    #[test]
    fn response_content_is_never_empty() {
        for action in Action::ALL {
            let outcome = IntrospectionOutcome::builder(action).build();
            assert!(!outcome.response_content().is_empty(), "{action}");
        }

        let outcome = decode(json!({ "action": "UNAUTHORIZED", "responseContent": null }));
        assert!(
            outcome
                .response_content()
                .starts_with(r#"Bearer error="invalid_token""#)
        );
    }

    #[test]
    fn internal_server_error_sends_no_challenge_header() {
        let outcome = IntrospectionOutcome::lookup_failed();
        assert_eq!(outcome.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome.www_authenticate(), None);
        assert!(outcome.response_content().contains("server_error"));
    }

    #[test]
    fn lifecycle_fields_are_hidden_for_nonexistent_tokens() {
        let outcome = decode(json!({
            "action": "UNAUTHORIZED",
            "existent": false,
            "scopes": ["profile"],
            "expiresAt": 1_700_000_000_000i64,
            "refreshable": true
        }));

        assert_eq!(outcome.scopes(), None);
        assert_eq!(outcome.expires_at_millis(), None);
        assert_eq!(outcome.refreshable(), None);
    }

    #[test]
    fn access_token_resources_never_widen() {
        let a = Url::parse("https://a.example.com/").unwrap();
        let b = Url::parse("https://b.example.com/").unwrap();
        let c = Url::parse("https://c.example.com/").unwrap();

        let outcome = IntrospectionOutcome::builder(Action::Ok)
            .resources([a.clone(), b.clone()])
            .access_token_resources([a.clone(), c])
            .build();

        assert_eq!(outcome.resources().len(), 2);
        assert_eq!(
            outcome.access_token_resources().iter().collect::<Vec<_>>(),
            vec![&a]
        );
    }

    #[test]
    fn decodes_authorization_details_in_both_shapes() {
        let wrapped = decode(json!({
            "action": "OK",
            "authorizationDetails": {
                "elements": [{
                    "type": "payment_initiation",
                    "actions": ["initiate"],
                    "instructedAmount": { "currency": "EUR", "amount": "123.50" }
                }]
            }
        }));
        let details = wrapped.authorization_details().unwrap();
        assert_eq!(details.elements[0].kind, "payment_initiation");
        assert_eq!(details.elements[0].actions, vec!["initiate"]);
        assert!(details.elements[0].extra.contains_key("instructedAmount"));

        let array = decode(json!({
            "action": "OK",
            "authorizationDetails": [{
                "type": "account_information",
                "locations": ["https://example.com/accounts"]
            }]
        }));
        let details = array.authorization_details().unwrap();
        assert_eq!(details.elements[0].kind, "account_information");
        assert_eq!(details.elements[0].locations.len(), 1);
    }

    #[test]
    fn ok_for_missing_token_becomes_unauthorized() {
        let outcome = decode(json!({
            "action": "OK",
            "existent": false,
            "usable": false,
            "responseContent": "Bearer error=\"invalid_request\""
        }));

        assert_eq!(outcome.action(), Action::Unauthorized);
        assert_eq!(outcome.status_code(), StatusCode::UNAUTHORIZED);
        assert!(
            outcome
                .response_content()
                .starts_with(r#"Bearer error="invalid_token""#)
        );
    }

    #[test]
    fn verdict_is_never_looser_than_token_state() {
        let expired = decode(json!({ "action": "FORBIDDEN", "existent": true, "usable": false }));
        assert_eq!(expired.action(), Action::Unauthorized);

        let narrow = decode(json!({
            "action": "OK",
            "existent": true,
            "usable": true,
            "sufficient": false
        }));
        assert_eq!(narrow.action(), Action::Forbidden);
        assert!(
            narrow
                .response_content()
                .starts_with(r#"Bearer error="insufficient_scope""#)
        );

        let consistent = decode(json!({
            "action": "OK",
            "existent": true,
            "usable": true,
            "sufficient": true
        }));
        assert_eq!(consistent.action(), Action::Ok);
    }

    #[test]
    fn rebuild_replaces_action_and_challenge() {
        let outcome = IntrospectionOutcome::builder(Action::Ok)
            .subject(Some("john".to_string()))
            .existent(true)
            .usable(true)
            .sufficient(true)
            .build()
            .rebuild(Action::Forbidden)
            .build();

        assert_eq!(outcome.action(), Action::Forbidden);
        assert_eq!(outcome.subject(), Some("john"));
        assert!(outcome.response_content().contains("insufficient_scope"));
    }

    #[test]
    fn summarize_masks_hidden_properties() {
        let outcome = IntrospectionOutcome::builder(Action::Ok)
            .subject(Some("john".to_string()))
            .existent(true)
            .usable(true)
            .sufficient(true)
            .properties(vec![
                Property::new("tenant", "acme"),
                Property {
                    key: "secret".to_string(),
                    value: "s3cr3t".to_string(),
                    hidden: true,
                },
            ])
            .build();

        let summary = outcome.summarize();
        assert!(summary.starts_with("action=OK, clientId=0, subject=john"));
        assert!(summary.contains("properties=tenant=acme,secret=***"));
        assert!(!summary.contains("s3cr3t"));
    }
}
