//! In-process store double.
//!
//! Evaluates the same [`Filter`] the REST client serializes, so router-level
//! tests exercise real query construction without a hosted store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{ensure_filtered, StoreConnector, StoreError, StoreSession, StoreUser};
use crate::filter::Filter;
use crate::types::{Operation, Record};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    users: RwLock<HashMap<String, StoreUser>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `user`; other tokens are rejected
    pub fn with_user(self, token: &str, user: StoreUser) -> Self {
        self.inner
            .users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.to_string(), user);
        self
    }

    /// Append rows to `table`; non-object values are ignored
    pub fn insert(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.inner.tables.write().unwrap_or_else(PoisonError::into_inner);
        let entry = tables.entry(table.to_string()).or_default();
        entry.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        }));
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every data operation fail with `message` until cleared
    pub fn set_failure(&self, message: Option<&str>) {
        *self.inner.failure.write().unwrap_or_else(PoisonError::into_inner) = message.map(str::to_string);
    }

    /// Number of store calls made through any session
    pub fn request_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, operation: Operation) -> Result<(), StoreError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if operation == Operation::Identify {
            return Ok(());
        }
        match self.inner.failure.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(message) => Err(StoreError::Rejected {
                operation,
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl StoreConnector for MemoryStore {
    fn connect(&self, token: &str) -> Arc<dyn StoreSession> {
        Arc::new(MemorySession {
            store: self.clone(),
            token: token.to_string(),
        })
    }
}

pub struct MemorySession {
    store: MemoryStore,
    token: String,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn current_user(&self) -> Result<Option<StoreUser>, StoreError> {
        self.store.record_call(Operation::Identify)?;
        let users = self.store.inner.users.read().unwrap_or_else(PoisonError::into_inner);
        match users.get(&self.token) {
            Some(user) => Ok(Some(user.clone())),
            None => Err(StoreError::Rejected {
                operation: Operation::Identify,
                status: 401,
                message: "invalid JWT".to_string(),
            }),
        }
    }

    async fn select(&self, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        self.store.record_call(Operation::Select)?;
        let tables = self.store.inner.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<Record> = tables
            .get(filter.table_name())
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        filter.sort(&mut rows);
        Ok(rows.into_iter().map(|row| filter.project(row)).collect())
    }

    async fn update(&self, filter: &Filter, patch: Record) -> Result<(), StoreError> {
        self.store.record_call(Operation::Update)?;
        ensure_filtered(Operation::Update, filter)?;
        let mut tables = self.store.inner.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(rows) = tables.get_mut(filter.table_name()) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, filter: &Filter) -> Result<(), StoreError> {
        self.store.record_call(Operation::Delete)?;
        ensure_filtered(Operation::Delete, filter)?;
        let mut tables = self.store.inner.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(rows) = tables.get_mut(filter.table_name()) {
            rows.retain(|row| !filter.matches(row));
        }
        Ok(())
    }
}
