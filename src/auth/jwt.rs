use crate::types::{AppError, Claims, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Resolves callers to user ids.
///
/// Bearer tokens are HS256 JWTs whose `sub` claim is the user id. When an
/// anonymous user is configured, requests without credentials act as that
/// user; otherwise they are rejected.
pub struct AuthService {
    jwt_secret: Option<String>,
    access_expiry: i64,
    anonymous_user: Option<String>,
}

impl AuthService {
    /// Creates a new AuthService.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret for signing tokens; `None` disables token auth
    /// * `access_expiry` - Token validity in seconds
    /// * `anonymous_user` - Identity used for requests without credentials
    pub fn new(
        jwt_secret: Option<String>,
        access_expiry: i64,
        anonymous_user: Option<String>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.filter(|s| !s.is_empty()),
            access_expiry,
            anonymous_user,
        }
    }

    fn secret(&self) -> Result<&[u8]> {
        self.jwt_secret
            .as_deref()
            .map(str::as_bytes)
            .ok_or_else(|| AppError::Auth("Token authentication is not configured".to_string()))
    }

    pub fn anonymous_user(&self) -> Option<&str> {
        self.anonymous_user.as_deref()
    }

    /// Issues an access token for `user_id`.
    pub fn issue_token(&self, user_id: &str) -> Result<String> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::InvalidInput("user id is required".to_string()));
        }

        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + Duration::seconds(self.access_expiry)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret()?),
        )
        .map_err(|e| AppError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret()?),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))
    }

    /// Resolve the caller from an optional `Authorization` header value.
    pub fn resolve_user(&self, authorization: Option<&str>) -> Result<String> {
        match authorization {
            Some(value) => {
                let token = value
                    .strip_prefix("Bearer ")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| AppError::Auth("Expected a Bearer token".to_string()))?;
                let claims = self.verify_token(token)?;
                if claims.sub.trim().is_empty() {
                    return Err(AppError::Auth("Token has no subject".to_string()));
                }
                Ok(claims.sub)
            }
            None => self
                .anonymous_user
                .clone()
                .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string())),
        }
    }
}
