use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use serde::Deserialize;

use super::ApiError;
use super::ApiJson;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::account::models::CreateAccountCommand;
use crate::domain::account::models::DisplayName;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::NewPassword;
use crate::domain::account::models::PhoneNumber;
use crate::domain::validation::ValidationErrors;
use crate::inbound::http::cookies::with_refresh_cookie;
use crate::inbound::http::device::ClientDevice;
use crate::inbound::http::router::AppState;

pub async fn register(
    State(state): State<AppState>,
    device: ClientDevice,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(HeaderMap, ApiSuccess<SessionData>), ApiError> {
    let device = device.with_device_id(body.device_id.clone());
    let command = body.try_into_command()?;

    let session = state.auth_service.register(command, device).await?;

    let now = state.clock.now();
    let headers = with_refresh_cookie(
        &session.tokens.refresh_token,
        session.tokens.refresh_expires_at - now,
        state.settings.cookie_secure,
    );

    Ok((
        headers,
        ApiSuccess::new(StatusCode::CREATED, SessionData::new(&session, now)),
    ))
}

/// HTTP request body for registration (raw JSON). Missing fields surface as
/// validation errors rather than deserialization failures.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    confirm_password: Option<String>,
    phone: Option<String>,
    device_id: Option<String>,
}

impl RegisterRequest {
    /// Validate every field, reporting all violations together.
    fn try_into_command(self) -> Result<CreateAccountCommand, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.check("name", DisplayName::new(self.name));
        let email = errors.check("email", EmailAddress::new(self.email));
        if self
            .confirm_password
            .as_ref()
            .is_some_and(|confirm| *confirm != self.password)
        {
            errors.push("confirmPassword", "Passwords do not match");
        }
        let password = errors.check("password", NewPassword::new(self.password));
        let phone = errors.check(
            "phone",
            self.phone
                .filter(|phone| !phone.trim().is_empty())
                .map(PhoneNumber::new)
                .transpose(),
        );

        match (name, email, password, phone) {
            (Some(name), Some(email), Some(password), Some(phone)) if errors.is_empty() => {
                Ok(CreateAccountCommand {
                    name,
                    email,
                    phone,
                    password,
                })
            }
            _ => Err(errors),
        }
    }
}
