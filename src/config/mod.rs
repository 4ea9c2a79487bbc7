use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the hosted store, e.g. https://xyz.supabase.co
    pub url: String,
    /// Project API key sent as `apikey` on every store call
    #[serde(skip_serializing)]
    pub key: String,
    pub messages_table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    /// Resolve the caller's identity on every route, not only on reads
    pub strict_identity_check: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid store URL '{0}'")]
    InvalidStoreUrl(String),

    #[error("Invalid messages table name '{0}'")]
    InvalidTableName(String),

    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Store
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.store.url = v.trim().to_string();
        }
        if let Ok(v) = env::var("SUPABASE_KEY") {
            self.store.key = v.trim().to_string();
        }
        if let Ok(v) = env::var("STORE_MESSAGES_TABLE") {
            self.store.messages_table = v.trim().to_string();
        }

        // API overrides
        if let Some(port) = port_from(|name| env::var(name).ok()) {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_STRICT_IDENTITY_CHECK") {
            self.security.strict_identity_check = v.parse().unwrap_or(self.security.strict_identity_check);
        }

        self
    }

    /// Check the settings the server cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.url.is_empty() {
            return Err(ConfigError::Missing("SUPABASE_URL"));
        }
        if self.store.key.is_empty() {
            return Err(ConfigError::Missing("SUPABASE_KEY"));
        }

        match url::Url::parse(&self.store.url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && !u.cannot_be_a_base() => {}
            _ => return Err(ConfigError::InvalidStoreUrl(self.store.url.clone())),
        }

        crate::filter::Filter::new(self.store.messages_table.as_str())
            .map_err(|_| ConfigError::InvalidTableName(self.store.messages_table.clone()))?;

        if self.environment != Environment::Development && self.security.cors_origins.is_empty() {
            return Err(ConfigError::Missing("SECURITY_CORS_ORIGINS"));
        }

        for origin in &self.security.cors_origins {
            if axum::http::HeaderValue::from_str(origin).is_err() || url::Url::parse(origin).is_err() {
                return Err(ConfigError::InvalidCorsOrigin(origin.clone()));
            }
        }

        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            store: StoreConfig::default(),
            api: ApiConfig {
                port: 3001,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string()],
                strict_identity_check: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            store: StoreConfig::default(),
            api: ApiConfig {
                port: 3001,
                enable_request_logging: true,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec![],
                strict_identity_check: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            store: StoreConfig::default(),
            api: ApiConfig {
                port: 3001,
                enable_request_logging: false,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec![],
                strict_identity_check: true,
            },
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            messages_table: "Messages".to_string(),
        }
    }
}

/// First of `RELAY_PORT`, `PORT` that holds a valid port; bad values are skipped with a warning
fn port_from(lookup: impl Fn(&str) -> Option<String>) -> Option<u16> {
    ["RELAY_PORT", "PORT"].into_iter().find_map(|name| {
        let raw = lookup(name)?;
        match raw.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                tracing::warn!("Ignoring {}='{}': not a valid port", name, raw);
                None
            }
        }
    })
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
