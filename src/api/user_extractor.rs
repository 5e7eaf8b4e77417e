use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::api::state::{AppContext, AppState};
use crate::error::ApiError;
use crate::model::{now, Principal, Resource, Session, User};
use crate::services::tokens;
use crate::store::{DocumentStore, ResourceStore, Store};

pub const TOKEN_COOKIE: &str = "token";

fn not_authorized() -> ApiError {
    ApiError::Unauthorized("Not authorized to access this route".to_string())
}

/// Resolves the signed-in user from a bearer token.
///
/// The token is read from `Authorization: Bearer <token>` first, then from
/// the `token` cookie. Missing, unknown and expired tokens are all rejected
/// with the same message.
#[async_trait]
impl<S> FromRequestParts<AppState<S>> for Principal
where
    S: Store + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(not_authorized)?;
        authenticate(state, &token).await
    }
}

pub async fn authenticate<S: Store>(context: &AppContext<S>, token: &str) -> Result<Principal, ApiError> {
    let digest = tokens::digest(token);
    let store = context.store.as_ref();

    let session = store.get::<Session>(&digest).await?.ok_or_else(not_authorized)?;
    if session.is_expired(now()) {
        store.delete(Session::COLLECTION, &digest).await?;
        log::debug!("Rejected expired session for user {}", session.user);
        return Err(not_authorized());
    }

    let user = store.get::<User>(&session.user).await?.ok_or_else(not_authorized)?;
    Ok(Principal::from_user(&user, Some(digest)))
}

/// Token from the Authorization header or the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_value(headers, TOKEN_COOKIE))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty() && *value != "none")
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=fromcookie"));

        assert_eq!(extract_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_cookie_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=fromcookie"));
        assert_eq!(extract_token(&headers), Some("fromcookie".to_string()));

        // Logout overwrites the cookie with a placeholder
        headers.insert(header::COOKIE, HeaderValue::from_static("token=none"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers), None);
    }
}
