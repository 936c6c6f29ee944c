//! Bearer authentication.
//!
//! Requests carry an HS256 JWT whose subject is a registry user id. The
//! middleware resolves it to an active [`User`](registry_core::models::User)
//! and stores it in the request extensions as [`CurrentUser`].

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::{issue_token, validate_token, JwtClaims};
pub use middleware::auth_middleware;
pub use models::CurrentUser;
