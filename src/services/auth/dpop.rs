//! DPoP proof の受け渡し (RFC 9449)
//!
//! Proof の署名/claim 検証は認可サーバ側 (introspection) の責務。
//! ここでは proof ヘッダの取り出しと、検証に必要な `htm` / `htu` の組み立てだけを行う。

use axum::http::{HeaderMap, Method, Uri, header};

/// Proof material forwarded to the introspection lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpopContext {
    pub proof: String,
    pub htm: String,
    pub htu: String,
}

/// Read the `DPoP` header and the request target it must be bound to.
///
/// Returns `None` when the request carries no (readable) proof.
pub fn context(
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
    public_base_url: Option<&str>,
) -> Option<DpopContext> {
    let proof = headers.get("DPoP")?.to_str().ok()?.trim();
    if proof.is_empty() {
        return None;
    }

    Some(DpopContext {
        proof: proof.to_string(),
        htm: method.as_str().to_string(),
        htu: build_expected_htu(headers, uri, public_base_url),
    })
}

fn build_expected_htu(headers: &HeaderMap, uri: &Uri, public_base_url: Option<&str>) -> String {
    if let Some(base) = public_base_url {
        match build_htu_from_base(base, uri) {
            Ok(url) => return url,
            Err(err) => {
                tracing::warn!(error = ?err, "invalid PUBLIC_BASE_URL, using forwarded headers")
            }
        }
    }
    build_htu_from_forwarded(headers, uri)
}

fn build_htu_from_base(base: &str, uri: &Uri) -> Result<String, url::ParseError> {
    // `base` は https://api.example.com のような公開 URL
    let mut url = url::Url::parse(base)?;

    // htu は query/fragment を含まない (RFC 9449 §4.2)
    url.set_path(uri.path());
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

fn build_htu_from_forwarded(headers: &HeaderMap, uri: &Uri) -> String {
    // Prefer proxy headers when present.
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}{}", scheme, host, uri.path())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn no_proof_header_means_no_context() {
        let headers = HeaderMap::new();
        let uri: Uri = "/api/v1/me".parse().unwrap();

        assert_eq!(context(&headers, &Method::GET, &uri, None), None);
    }

    #[test]
    fn builds_htu_from_public_base_url() {
        let mut headers = HeaderMap::new();
        headers.insert("DPoP", HeaderValue::from_static("eyJ.proof.sig"));
        let uri: Uri = "/api/v1/me?x=1".parse().unwrap();

        let ctx = context(&headers, &Method::GET, &uri, Some("https://api.example.com")).unwrap();

        assert_eq!(ctx.proof, "eyJ.proof.sig");
        assert_eq!(ctx.htm, "GET");
        assert_eq!(ctx.htu, "https://api.example.com/api/v1/me");
    }

    #[test]
    fn builds_htu_from_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("DPoP", HeaderValue::from_static("eyJ.proof.sig"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("rs.example.com"));
        let uri: Uri = "/api/v1/me".parse().unwrap();

        let ctx = context(&headers, &Method::POST, &uri, None).unwrap();

        assert_eq!(ctx.htm, "POST");
        assert_eq!(ctx.htu, "https://rs.example.com/api/v1/me");
    }
}
