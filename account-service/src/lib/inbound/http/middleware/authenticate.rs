use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::auth::errors::AuthError;
use crate::domain::auth::models::Identity;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

const BEARER_SCHEME: &str = "bearer ";

/// What the `Authorization` header holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Credentials<'a> {
    Absent,
    Malformed,
    Bearer(&'a str),
}

/// Read the bearer token. The scheme label is case-insensitive; an empty
/// token is malformed.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Credentials<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Credentials::Absent;
    };

    let Ok(value) = value.to_str() else {
        return Credentials::Malformed;
    };

    match value.get(..BEARER_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
            let token = value[BEARER_SCHEME.len()..].trim();
            if token.is_empty() {
                Credentials::Malformed
            } else {
                Credentials::Bearer(token)
            }
        }
        _ => Credentials::Malformed,
    }
}

/// Resolve a token to an identity, bounded by the configured timeout.
/// A timeout fails closed.
async fn resolve(state: &AppState, token: &str) -> Result<Identity, ApiError> {
    let lookup = state.auth_service.authenticate(token);

    match tokio::time::timeout(state.settings.auth_timeout, lookup).await {
        Ok(Ok(identity)) => Ok(identity),
        Ok(Err(e)) => {
            match &e {
                AuthError::TokenExpired => {
                    tracing::debug!(kind = "expired", "Authentication rejected")
                }
                AuthError::TokenInvalid => {
                    tracing::warn!(kind = "invalid", "Authentication rejected")
                }
                _ => tracing::error!(kind = "server", "Authentication lookup failed"),
            }
            Err(ApiError::from(e))
        }
        Err(_) => {
            tracing::error!(
                timeout_ms = state.settings.auth_timeout.as_millis(),
                "Authentication lookup timed out"
            );
            Err(ApiError::InternalServerError(
                "Authentication lookup timed out".to_string(),
            ))
        }
    }
}

/// Middleware for routes that require a caller. Attaches [`Identity`] to the
/// request extensions.
pub async fn require_authentication(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match bearer_token(req.headers()) {
        Credentials::Absent => return Err(ApiError::AuthenticationRequired),
        Credentials::Malformed => return Err(ApiError::InvalidToken),
        Credentials::Bearer(token) => resolve(&state, token).await?,
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Middleware for routes that serve anonymous callers too.
///
/// A missing or malformed header proceeds without an identity; a token that
/// is present but fails verification is still rejected.
pub async fn optional_authentication(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Credentials::Bearer(token) = bearer_token(req.headers()) {
        let identity = resolve(&state, token).await?;
        req.extensions_mut().insert(identity);
    }

    Ok(next.run(req).await)
}
