use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::cookies::refresh_token_from;
use crate::inbound::http::cookies::with_refresh_cookie;
use crate::inbound::http::device::ClientDevice;
use crate::inbound::http::router::AppState;

/// Rotate the refresh token carried in the `refreshToken` cookie.
pub async fn refresh_token(
    State(state): State<AppState>,
    device: ClientDevice,
    headers: HeaderMap,
) -> Result<(HeaderMap, ApiSuccess<AccessTokenData>), ApiError> {
    let token = refresh_token_from(&headers).ok_or(ApiError::AuthenticationRequired)?;

    let session = state.auth_service.refresh(&token, device.0).await?;

    let now = state.clock.now();
    let headers = with_refresh_cookie(
        &session.tokens.refresh_token,
        session.tokens.refresh_expires_at - now,
        state.settings.cookie_secure,
    );

    Ok((
        headers,
        ApiSuccess::new(StatusCode::OK, AccessTokenData::new(&session.tokens, now)),
    ))
}
