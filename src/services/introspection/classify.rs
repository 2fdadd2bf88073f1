//! Action derivation for a single introspection.
//!
//! First matching rule wins:
//! 1. no credential                     -> BAD_REQUEST
//! 2. lookup failed                     -> INTERNAL_SERVER_ERROR
//! 3. token missing or expired          -> UNAUTHORIZED
//! 4. scopes not covered / wrong owner  -> FORBIDDEN
//! 5. otherwise                         -> OK

use std::collections::BTreeSet;
use std::fmt;

use url::Url;

use super::action::Action;
use super::outcome::{IntrospectionOutcome, Property};
use crate::services::auth::{BearerChallenge, ErrorCode};

/// Facts about a token reported by the lookup, before any action is decided.
#[derive(Debug, Clone, Default)]
pub struct TokenFacts {
    pub existent: bool,
    pub usable: bool,
    pub refreshable: bool,
    pub client_id: u64,
    pub client_id_alias: Option<String>,
    pub subject: Option<String>,
    pub scopes: BTreeSet<String>,
    pub expires_at: i64,
    pub certificate_thumbprint: Option<String>,
    pub resources: BTreeSet<Url>,
    pub access_token_resources: BTreeSet<Url>,
    pub properties: Vec<Property>,
}

/// What the protected resource demands from the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    pub scopes: Vec<String>,
    pub subject: Option<String>,
}

impl AccessRequirement {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn is_covered_by(&self, granted: &BTreeSet<String>) -> bool {
        self.scopes.iter().all(|scope| granted.contains(scope))
    }

    fn accepts_subject(&self, subject: Option<&str>) -> bool {
        match self.subject.as_deref() {
            Some(expected) => subject == Some(expected),
            None => true,
        }
    }
}

/// Decide rules 3 to 5 from the facts of an existing lookup.
pub fn classify(facts: TokenFacts, requirement: &AccessRequirement) -> IntrospectionOutcome {
    let sufficient = facts.existent && requirement.is_covered_by(&facts.scopes);

    let (action, challenge) = if !facts.existent {
        (
            Action::Unauthorized,
            BearerChallenge::new(ErrorCode::InvalidToken)
                .description("The access token does not exist."),
        )
    } else if !facts.usable {
        (
            Action::Unauthorized,
            BearerChallenge::new(ErrorCode::InvalidToken)
                .description("The access token has expired."),
        )
    } else if !sufficient {
        (
            Action::Forbidden,
            BearerChallenge::new(ErrorCode::InsufficientScope)
                .description("The access token does not cover the required scopes.")
                .scope(requirement.scopes.iter().cloned()),
        )
    } else if !requirement.accepts_subject(facts.subject.as_deref()) {
        (
            Action::Forbidden,
            BearerChallenge::new(ErrorCode::InsufficientScope)
                .description("The access token was not issued for the expected subject.")
                .scope(requirement.scopes.iter().cloned()),
        )
    } else {
        (Action::Ok, Action::Ok.default_challenge())
    };

    let alias_used = facts.client_id_alias.is_some();

    IntrospectionOutcome::builder(action)
        .client_id(facts.client_id)
        .client_id_alias(facts.client_id_alias, alias_used)
        .subject(facts.subject)
        .scopes(facts.scopes)
        .existent(facts.existent)
        .usable(facts.existent && facts.usable)
        .sufficient(sufficient)
        .refreshable(facts.refreshable)
        .expires_at(facts.expires_at)
        .certificate_thumbprint(facts.certificate_thumbprint)
        .resources(facts.resources)
        .access_token_resources(facts.access_token_resources)
        .properties(facts.properties)
        .response_content(challenge.to_string())
        .build()
}

/// Run the full priority order. `lookup` is not called without a credential.
///
/// The lookup answers with an outcome already decided by the authorization
/// service (or by [`classify`]). Rules 4 and 5 are checked again against
/// `requirement`, so an OK that does not satisfy it is turned into FORBIDDEN.
pub async fn derive<F, Fut, E>(
    credential: Option<&str>,
    requirement: &AccessRequirement,
    lookup: F,
) -> IntrospectionOutcome
where
    F: FnOnce(&str) -> Fut,
    Fut: Future<Output = Result<IntrospectionOutcome, E>>,
    E: fmt::Display,
{
    let Some(token) = credential else {
        return IntrospectionOutcome::missing_credential();
    };

    match lookup(token).await {
        Ok(outcome) => enforce(outcome, requirement),
        Err(err) => {
            tracing::warn!(error = %err, "token lookup failed");
            IntrospectionOutcome::lookup_failed()
        }
    }
}

fn enforce(outcome: IntrospectionOutcome, requirement: &AccessRequirement) -> IntrospectionOutcome {
    match outcome.action() {
        Action::Ok => {}
        Action::InternalServerError
        | Action::BadRequest
        | Action::Unauthorized
        | Action::Forbidden => return outcome,
    }

    let covered = outcome
        .scopes()
        .is_some_and(|granted| requirement.is_covered_by(granted));
    if covered && requirement.accepts_subject(outcome.subject()) {
        return outcome;
    }

    tracing::warn!(
        subject = outcome.subject(),
        "OK verdict does not satisfy the access requirement"
    );
    let challenge = BearerChallenge::new(ErrorCode::InsufficientScope)
        .description("The access token does not meet the access requirement.")
        .scope(requirement.scopes.iter().cloned());
    outcome
        .rebuild(Action::Forbidden)
        .response_content(challenge.to_string())
        .build()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn facts(existent: bool, usable: bool, scopes: &[&str]) -> TokenFacts {
        TokenFacts {
            existent,
            usable,
            client_id: 42,
            subject: Some("john".to_string()),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expires_at: 1_700_000_000_000,
            ..TokenFacts::default()
        }
    }

    #[test]
    fn nonexistent_token_is_unauthorized_regardless_of_other_fields() {
        let requirement = AccessRequirement::default();
        for usable in [true, false] {
            let outcome = classify(facts(false, usable, &["profile"]), &requirement);
            assert_eq!(outcome.action(), Action::Unauthorized);
            assert_eq!(outcome.status_code().as_u16(), 401);
            assert!(!outcome.is_usable());
            assert!(!outcome.is_sufficient());
            assert!(
                outcome
                    .response_content()
                    .starts_with(r#"Bearer error="invalid_token""#)
            );
        }
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let outcome = classify(facts(true, false, &["profile"]), &AccessRequirement::default());
        assert_eq!(outcome.action(), Action::Unauthorized);
        assert!(outcome.response_content().contains("expired"));
    }

    #[test]
    fn insufficient_scope_is_forbidden_and_lists_required_scopes() {
        let requirement = AccessRequirement::new(["profile", "email"]);
        let outcome = classify(facts(true, true, &["profile"]), &requirement);

        assert_eq!(outcome.action(), Action::Forbidden);
        assert_eq!(outcome.status_code().as_u16(), 403);
        assert!(!outcome.is_sufficient());
        assert!(
            outcome
                .response_content()
                .starts_with(r#"Bearer error="insufficient_scope""#)
        );
        assert!(outcome.response_content().ends_with(r#"scope="profile email""#));
    }

    #[test]
    fn subject_mismatch_is_forbidden() {
        let requirement = AccessRequirement::new(["profile"]).with_subject("jane");
        let outcome = classify(facts(true, true, &["profile"]), &requirement);

        assert_eq!(outcome.action(), Action::Forbidden);
        assert!(outcome.is_sufficient());
        assert!(outcome.response_content().contains("expected subject"));
    }

    #[test]
    fn client_credentials_token_fails_subject_check() {
        let requirement = AccessRequirement::default().with_subject("john");
        let mut token = facts(true, true, &[]);
        token.subject = None;

        assert_eq!(classify(token, &requirement).action(), Action::Forbidden);
    }

    #[test]
    fn usable_and_sufficient_token_is_ok() {
        let requirement = AccessRequirement::new(["profile"]).with_subject("john");
        let outcome = classify(facts(true, true, &["profile", "email"]), &requirement);

        assert_eq!(outcome.action(), Action::Ok);
        assert_eq!(outcome.status_code().as_u16(), 200);
        assert_eq!(outcome.client_id(), 42);
        assert!(!outcome.response_content().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_never_calls_lookup() {
        let called = Cell::new(false);
        let outcome = derive(None, &AccessRequirement::default(), |_| {
            called.set(true);
            async { Err::<IntrospectionOutcome, _>("no lookup expected") }
        })
        .await;

        assert!(!called.get());
        assert_eq!(outcome.action(), Action::BadRequest);
        assert_eq!(outcome.status_code().as_u16(), 400);
        assert!(
            outcome
                .response_content()
                .starts_with(r#"Bearer error="invalid_request""#)
        );
    }

    #[tokio::test]
    async fn failed_lookup_is_internal_server_error() {
        let outcome = derive(Some("abc"), &AccessRequirement::default(), |_| async {
            Err::<IntrospectionOutcome, _>("connection refused")
        })
        .await;

        assert_eq!(outcome.action(), Action::InternalServerError);
        assert_eq!(outcome.www_authenticate(), None);
    }

    #[tokio::test]
    async fn lookup_receives_the_credential() {
        let requirement = AccessRequirement::new(["profile"]);
        let outcome = derive(Some("abc123"), &requirement, |token| {
            assert_eq!(token, "abc123");
            let outcome = classify(facts(true, true, &["profile"]), &requirement);
            async move { Ok::<_, String>(outcome) }
        })
        .await;
        assert_eq!(outcome.action(), Action::Ok);
    }

    #[tokio::test]
    async fn ok_verdict_not_meeting_requirement_is_forbidden() {
        let granted = classify(facts(true, true, &["email"]), &AccessRequirement::default());
        assert_eq!(granted.action(), Action::Ok);

        let requirement = AccessRequirement::new(["profile"]);
        let outcome = derive(Some("abc"), &requirement, |_| async move {
            Ok::<_, String>(granted)
        })
        .await;

        assert_eq!(outcome.action(), Action::Forbidden);
        assert!(outcome.response_content().ends_with(r#"scope="profile""#));
    }

    #[tokio::test]
    async fn ok_verdict_for_another_subject_is_forbidden() {
        let granted = classify(facts(true, true, &["profile"]), &AccessRequirement::default());
        let requirement = AccessRequirement::new(["profile"]).with_subject("jane");

        let outcome = derive(Some("abc"), &requirement, |_| async move {
            Ok::<_, String>(granted)
        })
        .await;

        assert_eq!(outcome.action(), Action::Forbidden);
    }
}
