//! HTTP response for a request the introspection verdict does not let through.
//!
//! Status code and `WWW-Authenticate` come straight from the outcome; the body
//! only repeats the RFC 6750 error code.

use axum::{
    Json,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::error::ErrorResponse;
use crate::services::introspection::IntrospectionOutcome;

#[derive(Debug)]
pub struct AuthRejection(pub IntrospectionOutcome);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let outcome = self.0;
        let status = outcome.status_code();

        let body = ErrorResponse::new(
            outcome.action().error_code().as_str(),
            status.canonical_reason().unwrap_or("error"),
        );
        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();

        if let Some(challenge) = outcome.www_authenticate() {
            match HeaderValue::from_str(challenge) {
                Ok(value) => {
                    headers.insert(header::WWW_AUTHENTICATE, value);
                }
                Err(err) => {
                    tracing::warn!(error = ?err, "challenge is not a valid header value");
                }
            }
        }

        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

        response
    }
}
