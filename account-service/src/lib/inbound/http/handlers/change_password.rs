use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Extension;
use serde::Deserialize;

use super::ApiError;
use super::ApiJson;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::account::models::NewPassword;
use crate::domain::auth::models::ChangePasswordCommand;
use crate::domain::auth::models::Identity;
use crate::domain::validation::ValidationErrors;
use crate::inbound::http::cookies::clearing_refresh_cookie;
use crate::inbound::http::router::AppState;

/// Change the caller's password. Every session is revoked, so the refresh
/// cookie is cleared as well.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<(HeaderMap, ApiSuccess<MessageData>), ApiError> {
    let command = body.try_into_command()?;

    state
        .auth_service
        .change_password(&identity.account_id, command)
        .await?;

    Ok((
        clearing_refresh_cookie(state.settings.cookie_secure),
        ApiSuccess::new(StatusCode::OK, MessageData::new("Password changed")),
    ))
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
    confirm_password: Option<String>,
}

impl ChangePasswordRequest {
    fn try_into_command(self) -> Result<ChangePasswordCommand, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.current_password.is_empty() {
            errors.push("currentPassword", "Current password is required");
        }
        if self
            .confirm_password
            .as_ref()
            .is_some_and(|confirm| *confirm != self.new_password)
        {
            errors.push("confirmPassword", "Passwords do not match");
        }
        let new_password = errors.check("newPassword", NewPassword::new(self.new_password));

        match new_password {
            Some(new_password) if errors.is_empty() => Ok(ChangePasswordCommand {
                current_password: self.current_password,
                new_password,
            }),
            _ => Err(errors),
        }
    }
}
