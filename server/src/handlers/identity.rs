use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::reservation::{Requester, Role};
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Identity is asserted by the gateway in front of this service; tokens are
/// validated there.
#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::AuthError("User not authenticated".to_string()))?;
        let user_id = raw_id
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| AppError::AuthError("Malformed user identity".to_string()))?;

        let role = match parts.headers.get(USER_ROLE_HEADER).map(|v| v.to_str()) {
            None => Role::User,
            Some(Ok(value)) if value.eq_ignore_ascii_case("admin") => Role::Admin,
            Some(Ok(value)) if value.eq_ignore_ascii_case("user") => Role::User,
            Some(_) => return Err(AppError::AuthError("Unknown user role".to_string())),
        };

        Ok(Requester { user_id, role })
    }
}
