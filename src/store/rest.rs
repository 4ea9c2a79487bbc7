use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

use super::{ensure_filtered, StoreConnector, StoreError, StoreSession, StoreUser};
use crate::config::StoreConfig;
use crate::filter::Filter;
use crate::types::{Operation, Record};

const AUTH_USER_PATH: &str = "auth/v1/user";
const REST_PATH: &str = "rest/v1/";

/// Connector for a Supabase-compatible deployment (GoTrue auth + PostgREST)
#[derive(Clone)]
pub struct RestConnector {
    base_url: Url,
    api_key: String,
    http: Client,
}

impl RestConnector {
    pub fn new(url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(url)?;
        // Keep any path prefix when joining relative endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(concat!("message-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Client)?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            http,
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::new(&config.url, config.key.clone())
    }
}

impl StoreConnector for RestConnector {
    fn connect(&self, token: &str) -> Arc<dyn StoreSession> {
        Arc::new(RestSession {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: token.to_string(),
            http: self.http.clone(),
        })
    }
}

pub struct RestSession {
    base_url: Url,
    api_key: String,
    token: String,
    http: Client,
}

impl RestSession {
    fn table_url(&self, filter: &Filter, pairs: Vec<(String, String)>) -> Result<Url, StoreError> {
        let mut url = self.base_url.join(REST_PATH)?.join(filter.table_name())?;
        url.query_pairs_mut().extend_pairs(pairs);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.api_key).bearer_auth(&self.token)
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| StoreError::Transport { operation, source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            operation,
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[async_trait]
impl StoreSession for RestSession {
    async fn current_user(&self) -> Result<Option<StoreUser>, StoreError> {
        let url = self.base_url.join(AUTH_USER_PATH)?;
        let response = self.send(Operation::Identify, self.http.get(url)).await?;

        let body: Value = response.json().await.map_err(|e| StoreError::Decode {
            operation: Operation::Identify,
            message: e.to_string(),
        })?;
        serde_json::from_value(body).map_err(|e| StoreError::Decode {
            operation: Operation::Identify,
            message: e.to_string(),
        })
    }

    async fn select(&self, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let url = self.table_url(filter, filter.to_query_pairs()?)?;
        tracing::debug!("store select: {}?{}", url.path(), url.query().unwrap_or(""));

        let response = self
            .send(Operation::Select, self.http.get(url).header("Accept", "application/json"))
            .await?;

        response.json::<Vec<Record>>().await.map_err(|e| StoreError::Decode {
            operation: Operation::Select,
            message: e.to_string(),
        })
    }

    async fn update(&self, filter: &Filter, patch: Record) -> Result<(), StoreError> {
        ensure_filtered(Operation::Update, filter)?;
        let url = self.table_url(filter, filter.to_where_pairs()?)?;
        tracing::debug!("store update: {}?{}", url.path(), url.query().unwrap_or(""));

        self.send(
            Operation::Update,
            self.http.patch(url).header("Prefer", "return=minimal").json(&patch),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, filter: &Filter) -> Result<(), StoreError> {
        ensure_filtered(Operation::Delete, filter)?;
        let url = self.table_url(filter, filter.to_where_pairs()?)?;
        tracing::debug!("store delete: {}?{}", url.path(), url.query().unwrap_or(""));

        self.send(Operation::Delete, self.http.delete(url).header("Prefer", "return=minimal"))
            .await?;
        Ok(())
    }
}

/// Pull the human-readable message out of a PostgREST or GoTrue error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
