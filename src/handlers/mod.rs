// handlers/mod.rs - HTTP handlers
//
// Public:    GET  /health
// Protected: POST /messages, /messages/delete, /messages/mark-complete
//            (bearer token required; guards live in crate::middleware)

pub mod health;
pub mod messages;

pub use health::health;
