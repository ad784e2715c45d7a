use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;

use super::AccountData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::account::errors::AccountError;
use crate::domain::account::models::AccountId;
use crate::domain::auth::models::Identity;
use crate::inbound::http::middleware::cache::evict_for;
use crate::inbound::http::router::AppState;
use crate::inbound::http::router::PROFILE_PATH;

/// Soft delete: the account is deactivated and its sessions revoked.
pub async fn deactivate_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiSuccess<AccountData>, ApiError> {
    let account_id = AccountId::from_string(&id).map_err(AccountError::from)?;

    let account = state
        .account_service
        .deactivate_account(&account_id)
        .await?;

    evict_for(state.cache.as_ref(), PROFILE_PATH, &Identity::from(&account)).await;

    Ok(ApiSuccess::new(StatusCode::OK, (&account).into()))
}
