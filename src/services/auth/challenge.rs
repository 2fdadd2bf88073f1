//! `WWW-Authenticate` challenge (RFC 6750 §3).

use std::fmt;

/// RFC 6750 error codes, plus `server_error` for failures on our side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    InvalidToken,
    InsufficientScope,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidToken => "invalid_token",
            ErrorCode::InsufficientScope => "insufficient_scope",
            ErrorCode::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Bearer error="<code>"[, error_description="<text>"][, scope="<scopes>"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    error: ErrorCode,
    description: Option<String>,
    scope: Vec<String>,
}

impl BearerChallenge {
    pub fn new(error: ErrorCode) -> Self {
        Self {
            error,
            description: None,
            scope: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }
}

impl fmt::Display for BearerChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bearer error=\"{}\"", self.error)?;
        if let Some(description) = &self.description {
            write!(f, ", error_description=\"{}\"", quoted(description))?;
        }
        if !self.scope.is_empty() {
            write!(f, ", scope=\"{}\"", quoted(&self.scope.join(" ")))?;
        }
        Ok(())
    }
}

// quoted-string: `"` と `\` だけエスケープする
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
