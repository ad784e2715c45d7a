//! Response cache for idempotent reads.
//!
//! Entries are scoped to the caller's organization and account so one
//! tenant's response is never replayed to another.

use axum::body::Body;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use chrono::Duration;

use crate::domain::auth::models::Identity;
use crate::domain::cache::CachedResponse;
use crate::domain::cache::ResponseCache;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_BYPASS: HeaderName = HeaderName::from_static("x-cache-bypass");

/// Per-route TTL override, set as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl(pub Duration);

/// Tenant part of a cache key.
pub fn tenant_discriminator(identity: Option<&Identity>) -> String {
    match identity {
        Some(identity) => format!(
            "org:{}:account:{}",
            identity
                .organization_id
                .map(|o| o.to_string())
                .unwrap_or_else(|| "none".to_string()),
            identity.account_id
        ),
        None => "anonymous".to_string(),
    }
}

pub fn cache_key(method: &Method, path_and_query: &str, tenant: &str) -> String {
    format!("{} {} {}", method, path_and_query, tenant)
}

/// Drop the cached GET and HEAD responses of `path` for one caller.
pub async fn evict_for(cache: &dyn ResponseCache, path: &str, identity: &Identity) {
    let tenant = tenant_discriminator(Some(identity));
    for method in [Method::GET, Method::HEAD] {
        cache.evict(&cache_key(&method, path, &tenant)).await;
    }
}

fn bypass_requested(req: &Request) -> bool {
    req.headers()
        .get(X_CACHE_BYPASS)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

fn replay(entry: CachedResponse) -> Response {
    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    let mut response = (status, entry.body).into_response();

    let headers = response.headers_mut();
    headers.remove(header::CONTENT_TYPE);
    if let Some(value) = entry
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
    response
}

/// Serve fresh entries without running the handler; otherwise run it and
/// keep a successful, small-enough response.
pub async fn cache_response(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !matches!(*req.method(), Method::GET | Method::HEAD) || bypass_requested(&req) {
        return Ok(next.run(req).await);
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let key = cache_key(
        req.method(),
        &path_and_query,
        &tenant_discriminator(req.extensions().get::<Identity>()),
    );
    let ttl = req
        .extensions()
        .get::<CacheTtl>()
        .map(|CacheTtl(ttl)| *ttl)
        .unwrap_or(state.settings.cache_default_ttl);

    if let Some(entry) = state.cache.get(&key, state.clock.now()).await {
        tracing::debug!(key = %key, "Cache hit");
        return Ok(replay(entry));
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("Failed to buffer response: {}", e)))?;

    if bytes.len() <= state.settings.cache_max_body_bytes {
        let entry = CachedResponse {
            status: parts.status.as_u16(),
            content_type: parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body: bytes.to_vec(),
            expires_at: state.clock.now() + ttl,
        };
        state.cache.set(key, entry).await;
    }

    parts
        .headers
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    Ok(Response::from_parts(parts, Body::from(bytes)))
}
