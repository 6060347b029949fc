//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.
//!
//! The gateway does not validate tokens itself: it forwards the caller's bearer
//! token to the hospital backend, which accepts or rejects it.

use axum::{
    extract::{Query, Request},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

/// The caller's bearer token, inserted into request extensions by `require_auth`.
#[derive(Clone, Debug)]
pub struct AuthToken(pub String);

/// Middleware that requires a bearer token and makes it available to handlers.
///
/// Browsers cannot set headers on WebSocket upgrades, so an `access_token`
/// query parameter is accepted as well. Missing tokens get 401 Unauthorized.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let token = bearer_token(req.headers())
        .or_else(|| query_token(req.uri()))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AuthToken(token));
    Ok(next.run(req).await)
}

/// Reads `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Reads the percent-decoded `access_token` query parameter.
fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.access_token)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_read() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn query_token_is_read() {
        let token = |uri: &'static str| query_token(&Uri::from_static(uri));
        assert_eq!(token("/ws?x=1&access_token=tok").as_deref(), Some("tok"));
        assert_eq!(token("/ws?access_token="), None);
        assert_eq!(token("/ws?x=1"), None);
        assert_eq!(token("/ws"), None);
    }

    #[test]
    fn query_token_is_percent_decoded() {
        let uri = Uri::from_static("/ws?access_token=a%2Bb%2Fc%3D");
        assert_eq!(query_token(&uri).as_deref(), Some("a+b/c="));
    }
}
