use crate::auth::jwt::AuthService;
use crate::types::AppError;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use std::sync::Arc;

/// The caller's user id, resolved once at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);

        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|h| {
                h.to_str()
                    .map_err(|_| AppError::Auth("Malformed Authorization header".to_string()))
            })
            .transpose()?;

        auth_service.resolve_user(authorization).map(AuthUser)
    }
}
