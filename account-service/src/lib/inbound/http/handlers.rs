use auth::IssuedTokens;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::header;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::account::errors::AccountError;
use crate::domain::account::models::Account;
use crate::domain::auth::errors::AuthError;
use crate::domain::auth::models::AuthSession;
use crate::domain::validation::FieldError;
use crate::domain::validation::ValidationErrors;

pub mod change_password;
pub mod deactivate_account;
pub mod get_me;
pub mod health;
pub mod login;
pub mod logout;
pub mod refresh_token;
pub mod register;
pub mod update_account;
pub mod verify_email;

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(data)))
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.1 .0.meta = Some(meta);
        self
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<serde_json::Value>,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: None,
        }
    }
}

/// Every failure the HTTP surface can report.
///
/// Messages of 5xx variants are internal: they are logged, never sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Validation(ValidationErrors),
    InvalidCredentials,
    AccountLocked { retry_after_secs: u64 },
    EmailUnverified,
    TokenExpired,
    InvalidToken,
    AuthenticationRequired,
    Forbidden,
    InvalidVerificationToken,
    Conflict(String),
    NotFound(String),
    InternalServerError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorData {
    pub code: &'static str,
    pub message: String,
    pub tracking_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorBody {
    success: bool,
    error: ApiErrorData,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidVerificationToken => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidCredentials
            | ApiError::TokenExpired
            | ApiError::InvalidToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::EmailUnverified | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::AccountLocked { .. } => StatusCode::LOCKED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            ApiError::EmailUnverified => "EMAIL_UNVERIFIED",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::InvalidVerificationToken => "INVALID_VERIFICATION_TOKEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "SERVER_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Validation failed".to_string(),
            ApiError::InvalidCredentials => "Invalid email or password".to_string(),
            ApiError::AccountLocked { .. } => {
                "Account temporarily locked due to too many failed login attempts".to_string()
            }
            ApiError::EmailUnverified => "Please verify your email address".to_string(),
            ApiError::TokenExpired => "Token expired".to_string(),
            ApiError::InvalidToken => "Invalid token".to_string(),
            ApiError::AuthenticationRequired => "Authentication required".to_string(),
            ApiError::Forbidden => "Insufficient permissions".to_string(),
            ApiError::InvalidVerificationToken => {
                "Invalid or expired verification token".to_string()
            }
            ApiError::Conflict(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::InternalServerError(_) => "An unexpected error occurred".to_string(),
        }
    }
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");

        let message = match rejection {
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::MissingJsonContentType(_) => "Expected Content-Type: application/json",
            JsonRejection::JsonDataError(_) => "Request body has invalid fields",
            _ => "Request body could not be read",
        };
        ApiError::Validation(ValidationErrors::single("body", message))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let tracking_id = Uuid::new_v4().to_string();

        if let ApiError::InternalServerError(internal) = &self {
            tracing::error!(
                tracking_id = %tracking_id,
                error = %internal,
                "Request failed"
            );
        }

        let retry_after = match &self {
            ApiError::AccountLocked { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ApiErrorBody {
            success: false,
            error: ApiErrorData {
                code: self.code(),
                message: self.public_message(),
                tracking_id,
                details: match &self {
                    ApiError::Validation(errors) => Some(errors.errors().to_vec()),
                    _ => None,
                },
                retry_after,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::AccountLocked { retry_after_secs } => {
                ApiError::AccountLocked { retry_after_secs }
            }
            AuthError::EmailUnverified => ApiError::EmailUnverified,
            AuthError::TokenExpired => ApiError::TokenExpired,
            AuthError::TokenInvalid => ApiError::InvalidToken,
            AuthError::InvalidVerificationToken => ApiError::InvalidVerificationToken,
            AuthError::Validation(errors) => ApiError::Validation(errors),
            AuthError::EmailAlreadyExists(_) => ApiError::Conflict(err.to_string()),
            AuthError::NotFound(_) => ApiError::NotFound("Account not found".to_string()),
            AuthError::TokenGenerationFailure(_) | AuthError::ServerError(_) => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(_) => ApiError::NotFound("Account not found".to_string()),
            AccountError::EmailAlreadyExists(_) => ApiError::Conflict(err.to_string()),
            AccountError::InvalidAccountId(e) => {
                ApiError::Validation(ValidationErrors::single("id", e))
            }
            AccountError::CorruptRecord(_)
            | AccountError::DatabaseError(_)
            | AccountError::SessionStore(_) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

/// Client-facing projection of an account. Never carries the password hash,
/// MFA secret, recovery codes, lockout counters or verification token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub roles: Vec<String>,
    pub organization_id: Option<String>,
    pub active: bool,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountData {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.as_str().to_string(),
            email: account.email.as_str().to_string(),
            phone: account.phone.as_ref().map(|p| p.as_str().to_string()),
            roles: account.role_names(),
            organization_id: account.organization_id.map(|o| o.to_string()),
            active: account.active,
            email_verified: account.email_verified,
            mfa_enabled: account.mfa.enabled,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Body of a refresh: a new access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenData {
    pub access_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

impl AccessTokenData {
    pub fn new(tokens: &IssuedTokens, now: DateTime<Utc>) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            expires_in: (tokens.access_expires_at - now).num_seconds().max(0),
        }
    }
}

/// Body of register and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: AccountData,
    pub access_token: String,
    pub expires_in: i64,
}

impl SessionData {
    pub fn new(session: &AuthSession, now: DateTime<Utc>) -> Self {
        let AccessTokenData {
            access_token,
            expires_in,
        } = AccessTokenData::new(&session.tokens, now);
        Self {
            user: (&session.account).into(),
            access_token,
            expires_in,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
