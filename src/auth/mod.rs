//! Caller identity
//!
//! - [`auth::jwt`](crate::auth::jwt) - HS256 token issuing/verification and user resolution
//! - [`auth::middleware`](crate::auth::middleware) - the [`AuthUser`](middleware::AuthUser) extractor
//!
//! Handlers take `AuthUser` and pass its id explicitly to every store and
//! chat call; there is no process-wide current user.
//!
//! ```ignore
//! async fn handler(AuthUser(user_id): AuthUser, State(state): State<AppState>) { ... }
//! ```

/// JWT token generation and verification.
pub mod jwt;
/// Request extractor resolving the caller.
pub mod middleware;
