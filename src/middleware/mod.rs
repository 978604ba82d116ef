mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{BearerToken, auth_middleware, optional_auth, require_admin};
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, rate_limit};
