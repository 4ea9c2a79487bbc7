pub mod auth;

pub use auth::{require_session, require_user, AuthSession};
