use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::server::AppState;
use crate::store::{StoreSession, StoreUser};

/// Store session scoped to the caller's bearer token, injected by the guards
#[derive(Clone)]
pub struct AuthSession {
    pub store: Arc<dyn StoreSession>,
    /// Present whenever the guard resolved the caller's identity
    pub user: Option<StoreUser>,
}

impl AuthSession {
    /// Name for log lines: email when known, then user id
    pub fn caller(&self) -> &str {
        match &self.user {
            Some(user) => user.email.as_deref().unwrap_or(&user.id),
            None => "unverified caller",
        }
    }
}

/// Guard for read routes: always resolves the caller's identity
pub async fn require_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = authorize(&state, &headers, true).await?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Guard for mutating routes: resolves identity only when strict checking is on
pub async fn require_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let verify = state.config.security.strict_identity_check;
    let session = authorize(&state, &headers, verify).await?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

async fn authorize(state: &AppState, headers: &HeaderMap, verify: bool) -> Result<AuthSession, ApiError> {
    let token = extract_bearer_token(headers)?;
    let store = state.connector.connect(token);

    if !verify {
        return Ok(AuthSession { store, user: None });
    }

    match store.current_user().await {
        Ok(Some(user)) => {
            tracing::debug!("Session resolved for user {}", user.id);
            Ok(AuthSession { store, user: Some(user) })
        }
        Ok(None) => {
            tracing::warn!("Session rejected: store returned no user for token");
            Err(ApiError::InvalidSession)
        }
        Err(e) => {
            tracing::warn!("Session rejected: {}", e);
            Err(ApiError::InvalidSession)
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_str = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingHeader)?;

    auth_str.split_whitespace().nth(1).ok_or(ApiError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::config::AppConfig;
    use crate::store::{MemoryStore, StoreConnector};

    fn state(strict: bool) -> AppState {
        let mut config = AppConfig::development();
        config.security.strict_identity_check = strict;
        let store = MemoryStore::new().with_user(
            "good",
            StoreUser { id: "user-1".to_string(), email: Some("ops@acme.io".to_string()) },
        );
        AppState::new(config, store)
    }

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn missing_header() {
        assert!(matches!(extract_bearer_token(&headers(None)), Err(ApiError::MissingHeader)));
        assert!(matches!(extract_bearer_token(&headers(Some(""))), Err(ApiError::MissingHeader)));
    }

    #[test]
    fn missing_token() {
        assert!(matches!(extract_bearer_token(&headers(Some("Bearer"))), Err(ApiError::MissingToken)));
        assert!(matches!(extract_bearer_token(&headers(Some("Bearer   "))), Err(ApiError::MissingToken)));
    }

    #[test]
    fn extracts_token() {
        assert_eq!(extract_bearer_token(&headers(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert_eq!(extract_bearer_token(&headers(Some("Bearer  spaced"))).unwrap(), "spaced");
    }

    #[test]
    fn non_ascii_header_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff").unwrap());
        assert!(matches!(extract_bearer_token(&headers), Err(ApiError::MissingHeader)));
    }

    #[tokio::test]
    async fn verified_session_carries_the_user() {
        let session = authorize(&state(true), &headers(Some("Bearer good")), true).await.unwrap();
        assert_eq!(session.user.as_ref().map(|u| u.id.as_str()), Some("user-1"));
        assert_eq!(session.caller(), "ops@acme.io");
    }

    #[tokio::test]
    async fn unverified_session_has_no_user() {
        let session = authorize(&state(false), &headers(Some("Bearer anything")), false).await.unwrap();
        assert!(session.user.is_none());
        assert_eq!(session.caller(), "unverified caller");
    }

    #[test]
    fn caller_falls_back_to_user_id() {
        let session = AuthSession {
            store: MemoryStore::new().connect("t"),
            user: Some(StoreUser { id: "user-9".to_string(), email: None }),
        };
        assert_eq!(session.caller(), "user-9");
    }
}
