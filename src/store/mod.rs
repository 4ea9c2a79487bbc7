//! Remote data store access.
//!
//! A [`StoreConnector`] is the factory the auth guard calls once per request
//! with the caller's bearer token. The [`StoreSession`] it returns carries
//! that token on every call, so row-level policies on the store side apply to
//! the caller rather than to the relay.

pub mod memory;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{Filter, FilterError};
use crate::types::{Operation, Record};

pub use memory::MemoryStore;
pub use rest::RestConnector;

/// Identity the store resolves from a session's token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} rejected by store ({status}): {message}")]
    Rejected {
        operation: Operation,
        status: u16,
        message: String,
    },

    #[error("{operation} returned an unreadable body: {message}")]
    Decode { operation: Operation, message: String },

    #[error("{0} without conditions refused")]
    Unfiltered(Operation),

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Builds token-scoped sessions; one per request
pub trait StoreConnector: Send + Sync {
    fn connect(&self, token: &str) -> Arc<dyn StoreSession>;
}

#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Resolve the user the session's token belongs to
    async fn current_user(&self) -> Result<Option<StoreUser>, StoreError>;

    async fn select(&self, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    /// Merge `patch` into every row the filter matches
    async fn update(&self, filter: &Filter, patch: Record) -> Result<(), StoreError>;

    async fn delete(&self, filter: &Filter) -> Result<(), StoreError>;
}

/// Mutations must be scoped; an empty filter would touch the whole table
pub(crate) fn ensure_filtered(operation: Operation, filter: &Filter) -> Result<(), StoreError> {
    if filter.conditions().is_empty() {
        return Err(StoreError::Unfiltered(operation));
    }
    Ok(())
}
