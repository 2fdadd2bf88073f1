//! `Authorization` ヘッダからの access token 抽出 (RFC 6750 / RFC 9449)
//!
//! - `Bearer <token>` / `DPoP <token>` の 2 方式
//! - keyword は case-insensitive、前後の空白は許容
//! - token 部分に空白が含まれる場合は不正なヘッダとして扱い、None を返す
//!
//! The token is returned exactly as presented. It is not guaranteed to be
//! Base64, so nothing here tries to decode it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Authorization scheme carrying an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Bearer,
    DPoP,
}

impl Scheme {
    /// Order in which `extract_any` tries the schemes.
    pub const ALL: [Scheme; 2] = [Scheme::DPoP, Scheme::Bearer];

    pub fn keyword(self) -> &'static str {
        match self {
            Scheme::Bearer => "Bearer",
            Scheme::DPoP => "DPoP",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Scheme::Bearer => &BEARER_PATTERN,
            Scheme::DPoP => &DPOP_PATTERN,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

static BEARER_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(Scheme::Bearer));
static DPOP_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(Scheme::DPoP));

fn compile(scheme: Scheme) -> Regex {
    // `<keyword> <token>` の 1 語のみ。keyword と token の間には空白が最低 1 つ必要
    // (RFC 6750 の `1*SP`)。`DPoPabc` のように区切りのないものは keyword 違いとして扱う
    let pattern = format!(r"^\s*(?i:{})\s+(\S+)\s*$", scheme.keyword());
    Regex::new(&pattern).expect("authorization pattern must compile")
}

/// Extract the access token for `scheme` from an `Authorization` header value.
///
/// Returns `None` when the header is absent, uses another scheme, carries no
/// token, or carries more than one whitespace-separated token.
///
/// ```
/// use resource_guard::services::auth::credential::{Scheme, extract};
///
/// assert_eq!(extract(Scheme::Bearer, Some("bearer   abc123  ")), Some("abc123"));
/// assert_eq!(extract(Scheme::Bearer, Some("Basic abc123")), None);
/// ```
pub fn extract(scheme: Scheme, header_value: Option<&str>) -> Option<&str> {
    let captures = scheme.pattern().captures(header_value?)?;
    captures.get(1).map(|m| m.as_str())
}

/// Try every supported scheme (DPoP first) and return the first match.
pub fn extract_any(header_value: Option<&str>) -> Option<(Scheme, &str)> {
    Scheme::ALL
        .into_iter()
        .find_map(|scheme| extract(scheme, header_value).map(|token| (scheme, token)))
}
