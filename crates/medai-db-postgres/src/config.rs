//! Connection settings for the PostgreSQL backend.
//!
//! Deserialized straight from the `[postgres]` section of the server config.
//! `url` wins when set; otherwise the URL is assembled from the parts.

use serde::{Deserialize, Serialize};

use crate::pool::mask_password;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,

    /// Upper bound on pooled connections. A quarter of it is kept warm.
    pub pool_size: u32,
    /// How long a request waits for a free connection.
    pub connect_timeout_ms: u64,
    /// Idle connections are closed after this; `None` keeps them.
    pub idle_timeout_ms: Option<u64>,
    pub run_migrations: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: None,
            database: "medai".into(),
            pool_size: 10,
            connect_timeout_ms: 5000,
            idle_timeout_ms: Some(300_000),
            run_migrations: true,
        }
    }
}

impl PostgresConfig {
    /// Settings for a known URL with default pool options.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let password = self
            .password
            .as_deref()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        format!(
            "postgres://{}{password}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }

    /// The connection URL with its password hidden, for logs.
    pub fn redacted_url(&self) -> String {
        mask_password(&self.connection_url())
    }

    /// Checks the settings the pool cannot start without.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("postgres.pool_size must be > 0".into());
        }
        if self.url.is_none() && self.host.is_empty() {
            return Err("postgres.url or postgres.host is required".into());
        }
        Ok(())
    }
}
