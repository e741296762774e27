//! Pool construction for the PostgreSQL backend.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Connections are recycled after this long regardless of use.
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Opens the pool described by `config`.
#[instrument(skip(config), fields(url = %config.redacted_url()))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    config.validate().map_err(PostgresError::config)?;

    let warm = (config.pool_size / 4).clamp(1, config.pool_size);
    info!(
        pool_size = config.pool_size,
        warm,
        connect_timeout_ms = config.connect_timeout_ms,
        "opening PostgreSQL pool"
    );

    let mut options = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .min_connections(warm)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(MAX_LIFETIME);
    if let Some(idle) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle));
    }

    let pool = options.connect(&config.connection_url()).await?;
    debug!("PostgreSQL pool ready");
    Ok(pool)
}

/// Replaces the password in a connection URL with `****`.
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at) = url.find('@')
        && let Some(colon) = url[..at].rfind(':')
    {
        let scheme_end = url.find("://").map_or(0, |p| p + 3);
        if colon > scheme_end {
            return format!("{}:****{}", &url[..colon], &url[at..]);
        }
    }
    url.to_string()
}
