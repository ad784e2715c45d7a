use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::auth::models::Identity;
use crate::inbound::http::cookies::clearing_refresh_cookie;
use crate::inbound::http::router::AppState;

pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<(HeaderMap, ApiSuccess<MessageData>), ApiError> {
    state.auth_service.logout(&identity.account_id).await?;

    Ok((
        clearing_refresh_cookie(state.settings.cookie_secure),
        ApiSuccess::new(StatusCode::OK, MessageData::new("Logged out")),
    ))
}
