use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use axum::routing::put;
use axum::Extension;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::MakeRequestUuid;
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::request_id::SetRequestIdLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::change_password::change_password;
use super::handlers::deactivate_account::deactivate_account;
use super::handlers::get_me::get_me;
use super::handlers::health::health;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::refresh_token::refresh_token;
use super::handlers::register::register;
use super::handlers::update_account::update_account;
use super::handlers::verify_email::verify_email;
use super::middleware::authenticate::optional_authentication;
use super::middleware::authenticate::require_authentication;
use super::middleware::authorize::require_roles;
use super::middleware::authorize::RequiredRoles;
use super::middleware::cache::cache_response;
use super::middleware::cache::CacheTtl;
use crate::domain::account::models::Role;
use crate::domain::account::ports::AccountServicePort;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::cache::ResponseCache;
use crate::domain::clock::Clock;

pub const PROFILE_PATH: &str = "/api/v1/users/me";

/// Profile reads change rarely and are evicted on admin updates.
const PROFILE_CACHE_TTL_SECS: i64 = 300;

const ADMIN_ONLY: RequiredRoles = RequiredRoles(&[Role::Admin]);

/// HTTP-layer tunables taken from configuration.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Upper bound on the account lookup done per authenticated request.
    pub auth_timeout: Duration,
    pub cache_default_ttl: chrono::Duration,
    pub cache_max_body_bytes: usize,
    pub cookie_secure: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthServicePort>,
    pub account_service: Arc<dyn AccountServicePort>,
    pub cache: Arc<dyn ResponseCache>,
    pub clock: Arc<dyn Clock>,
    pub settings: HttpSettings,
}

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh-token", post(refresh_token))
        .route("/api/v1/auth/verify-email", post(verify_email));

    let authenticated_routes = Router::new()
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/password", put(change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authentication,
        ));

    // Layers run outermost-last: authenticate, then set the TTL, then cache.
    let profile_routes = Router::new()
        .route(PROFILE_PATH, get(get_me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            cache_response,
        ))
        .route_layer(Extension(CacheTtl(chrono::Duration::seconds(
            PROFILE_CACHE_TTL_SECS,
        ))))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authentication,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/v1/users/:id",
            patch(update_account).delete(deactivate_account),
        )
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, require_roles))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authentication,
        ));

    let health_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_authentication,
        ));

    // No headers in the span: they carry bearer tokens and refresh cookies.
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("none");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri().path(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(profile_routes)
        .merge(admin_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(trace_layer)
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
