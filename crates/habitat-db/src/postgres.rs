//! `PostgreSQL` connection pool and schema bootstrap.
//!
//! Queries are runtime-checked (`sqlx::query`, not the compile-time
//! macros) so the workspace builds without a live database. The schema is
//! created idempotently on connect.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Statements that bootstrap the relational schema. Each is idempotent.
const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS events (
        version BIGINT UNIQUE NOT NULL,
        tick BIGINT NOT NULL,
        type TEXT NOT NULL,
        agent_id UUID NULL,
        payload JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE INDEX IF NOT EXISTS events_tick_idx ON events (tick)",
    r"CREATE INDEX IF NOT EXISTS events_agent_idx ON events (agent_id, tick)",
    r"CREATE TABLE IF NOT EXISTS experiments (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS snapshots (
        id BIGSERIAL PRIMARY KEY,
        experiment_id UUID NULL,
        variant_id UUID NULL,
        tick BIGINT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// A connected `PostgreSQL` pool with the Habitat schema in place.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Connect to `PostgreSQL` and bootstrap the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the connection or any schema
    /// statement fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await?;

        for statement in SCHEMA {
            let _ = sqlx::query(statement).execute(&pool).await?;
        }

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// The underlying pool, for the table-specific stores.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
