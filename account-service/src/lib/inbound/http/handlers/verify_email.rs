use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::ApiError;
use super::ApiJson;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::validation::ValidationErrors;
use crate::inbound::http::router::AppState;

pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyEmailRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(ValidationErrors::single("token", "Verification token is required").into());
    }

    state.auth_service.verify_email(token).await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        MessageData::new("Email verified"),
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    token: String,
}
