use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::AccountData;
use super::ApiError;
use super::ApiJson;
use super::ApiSuccess;
use crate::domain::account::errors::AccountError;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::DisplayName;
use crate::domain::account::models::PhoneNumber;
use crate::domain::account::models::UpdateProfileCommand;
use crate::domain::auth::models::Identity;
use crate::domain::validation::ValidationErrors;
use crate::inbound::http::middleware::cache::evict_for;
use crate::inbound::http::router::AppState;
use crate::inbound::http::router::PROFILE_PATH;

/// HTTP request body for updating an account profile (raw JSON)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateAccountRequest {
    fn try_into_command(self) -> Result<UpdateProfileCommand, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.check("name", self.name.map(DisplayName::new).transpose());
        let phone = errors.check("phone", self.phone.map(PhoneNumber::new).transpose());

        let command = UpdateProfileCommand {
            name: name.flatten(),
            phone: phone.flatten(),
        };
        if errors.is_empty() && command.is_empty() {
            errors.push("body", "Provide at least one of name or phone");
        }

        errors.into_result().map(|_| command)
    }
}

pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<ApiSuccess<AccountData>, ApiError> {
    let account_id = AccountId::from_string(&id).map_err(AccountError::from)?;
    let command = req.try_into_command()?;

    let account = state
        .account_service
        .update_profile(&account_id, command)
        .await?;

    evict_for(state.cache.as_ref(), PROFILE_PATH, &Identity::from(&account)).await;

    Ok(ApiSuccess::new(StatusCode::OK, (&account).into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_rejected() {
        let errors = UpdateAccountRequest::default()
            .try_into_command()
            .unwrap_err();

        assert_eq!(errors.errors()[0].field, "body");
    }

    #[test]
    fn test_invalid_fields_reported() {
        let errors = UpdateAccountRequest {
            name: Some("A".to_string()),
            phone: Some("0000".to_string()),
        }
        .try_into_command()
        .unwrap_err();

        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn test_partial_update() {
        let command = UpdateAccountRequest {
            name: Some("Annabel".to_string()),
            phone: None,
        }
        .try_into_command()
        .unwrap();

        assert_eq!(command.name.unwrap().as_str(), "Annabel");
        assert!(command.phone.is_none());
    }
}
