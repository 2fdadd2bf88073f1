use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;

use crate::services::auth::{BearerChallenge, ErrorCode};

/// What the resource server must do with the request.
///
/// Each variant maps to exactly one HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    InternalServerError,
    BadRequest,
    Unauthorized,
    Forbidden,
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown introspection action: {0}")]
pub struct UnknownAction(pub String);

impl Action {
    pub const ALL: [Action; 5] = [
        Action::InternalServerError,
        Action::BadRequest,
        Action::Unauthorized,
        Action::Forbidden,
        Action::Ok,
    ];

    pub fn status_code(self) -> StatusCode {
        match self {
            Action::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Action::BadRequest => StatusCode::BAD_REQUEST,
            Action::Unauthorized => StatusCode::UNAUTHORIZED,
            Action::Forbidden => StatusCode::FORBIDDEN,
            Action::Ok => StatusCode::OK,
        }
    }

    /// Wire name (`"INTERNAL_SERVER_ERROR"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Action::InternalServerError => "INTERNAL_SERVER_ERROR",
            Action::BadRequest => "BAD_REQUEST",
            Action::Unauthorized => "UNAUTHORIZED",
            Action::Forbidden => "FORBIDDEN",
            Action::Ok => "OK",
        }
    }

    /// RFC 6750 error code reported for this action.
    ///
    /// `Ok` reports `invalid_request`: the simplest challenge the resource
    /// server can reuse if it later rejects the request on its own.
    pub fn error_code(self) -> ErrorCode {
        match self {
            Action::InternalServerError => ErrorCode::ServerError,
            Action::BadRequest | Action::Ok => ErrorCode::InvalidRequest,
            Action::Unauthorized => ErrorCode::InvalidToken,
            Action::Forbidden => ErrorCode::InsufficientScope,
        }
    }

    /// Challenge used when the verdict comes without `responseContent`.
    pub fn default_challenge(self) -> BearerChallenge {
        let challenge = BearerChallenge::new(self.error_code());
        match self {
            Action::InternalServerError => {
                challenge.description("The introspection lookup could not be completed.")
            }
            Action::BadRequest => challenge
                .description("An access token must be presented in the Authorization header."),
            Action::Unauthorized => {
                challenge.description("The access token does not exist or has expired.")
            }
            Action::Forbidden => {
                challenge.description("The access token does not cover the required scopes.")
            }
            Action::Ok => challenge,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn status_codes_are_fixed() {
        assert_eq!(Action::InternalServerError.status_code().as_u16(), 500);
        assert_eq!(Action::BadRequest.status_code().as_u16(), 400);
        assert_eq!(Action::Unauthorized.status_code().as_u16(), 401);
        assert_eq!(Action::Forbidden.status_code().as_u16(), 403);
        assert_eq!(Action::Ok.status_code().as_u16(), 200);
    }

    #[test]
    fn no_two_actions_share_a_status_code() {
        let codes: HashSet<_> = Action::ALL.iter().map(|a| a.status_code()).collect();
        assert_eq!(codes.len(), Action::ALL.len());
    }

    #[test]
    fn parses_wire_names() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert_eq!(
            "ok".parse::<Action>(),
            Err(UnknownAction("ok".to_string()))
        );
    }

    #[test]
    fn default_challenges_use_rfc6750_codes() {
        assert_eq!(
            Action::Ok.default_challenge().to_string(),
            r#"Bearer error="invalid_request""#
        );
        assert!(
            Action::Unauthorized
                .default_challenge()
                .to_string()
                .starts_with(r#"Bearer error="invalid_token""#)
        );
        assert!(
            Action::Forbidden
                .default_challenge()
                .to_string()
                .starts_with(r#"Bearer error="insufficient_scope""#)
        );
    }
}
