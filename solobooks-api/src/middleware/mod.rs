pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, AuthUser};
