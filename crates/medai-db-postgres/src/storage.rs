//! `PostgresStorage`: the sqlx-backed implementation of the storage traits.
//!
//! Trait impls live in [`crate::queries`]; this module owns the pool and
//! startup.

use sqlx_postgres::PgPool;
use tracing::info;

use crate::config::PostgresConfig;
use crate::error::Result;
use crate::{migrations, pool};

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connects and, when configured, applies migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        let pool = pool::create_pool(&config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        info!("PostgreSQL storage ready");
        Ok(Self { pool })
    }

    /// Wraps an existing pool. Migrations are not run.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
