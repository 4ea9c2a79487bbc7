pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
pub mod store;
pub mod types;

pub use server::{app, AppState};
