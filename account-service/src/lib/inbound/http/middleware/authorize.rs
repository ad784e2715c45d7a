use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::account::models::Role;
use crate::domain::auth::models::Identity;
use crate::inbound::http::handlers::ApiError;

/// Roles admitted by a route. Used as the state of [`require_roles`].
#[derive(Debug, Clone, Copy)]
pub struct RequiredRoles(pub &'static [Role]);

/// Role gate.
///
/// # Errors
/// * `AuthenticationRequired` - No identity
/// * `Forbidden` - Identity holds none of `allowed`
pub fn authorize(identity: Option<&Identity>, allowed: &[Role]) -> Result<(), ApiError> {
    let identity = identity.ok_or(ApiError::AuthenticationRequired)?;

    if identity.has_any_role(allowed) {
        Ok(())
    } else {
        tracing::warn!(
            account_id = %identity.account_id,
            "Insufficient permissions"
        );
        Err(ApiError::Forbidden)
    }
}

/// Middleware form of [`authorize`]; must run inside authentication.
pub async fn require_roles(
    State(RequiredRoles(allowed)): State<RequiredRoles>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(req.extensions().get::<Identity>(), allowed)?;
    Ok(next.run(req).await)
}
