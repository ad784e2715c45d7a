use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::ApiError;
use super::ApiJson;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::account::models::EmailAddress;
use crate::domain::auth::models::LoginCommand;
use crate::domain::session::models::DeviceDescriptor;
use crate::domain::validation::ValidationErrors;
use crate::inbound::http::cookies::with_refresh_cookie;
use crate::inbound::http::device::ClientDevice;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    device: ClientDevice,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<(HeaderMap, ApiSuccess<SessionData>), ApiError> {
    let device = device.with_device_id(body.device_id.clone());
    let command = body.try_into_command(device)?;

    let outcome = state.auth_service.login(command).await?;
    let session = outcome.session;

    let now = state.clock.now();
    let headers = with_refresh_cookie(
        &session.tokens.refresh_token,
        session.tokens.refresh_expires_at - now,
        state.settings.cookie_secure,
    );
    let meta = json!({
        "security": {
            "mfaEnabled": session.account.mfa.enabled,
            "lastLogin": outcome.previous_login_at,
        }
    });

    Ok((
        headers,
        ApiSuccess::new(StatusCode::OK, SessionData::new(&session, now)).with_meta(meta),
    ))
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    email: String,
    password: String,
    device_id: Option<String>,
}

impl LoginRequest {
    fn try_into_command(self, device: DeviceDescriptor) -> Result<LoginCommand, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = errors.check("email", EmailAddress::new(self.email));
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(LoginCommand {
                email,
                password: self.password,
                device,
            }),
            _ => Err(errors),
        }
    }
}
