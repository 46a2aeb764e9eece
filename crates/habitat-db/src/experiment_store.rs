//! Durable experiment persistence.
//!
//! Experiments (with their variants) are stored as one JSONB document per
//! row, keyed by experiment id. The controller holds the live copy; rows
//! here survive restarts and back the experiments API after a crash.

use habitat_types::{Experiment, ExperimentId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `experiments` table.
pub struct ExperimentStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ExperimentStore<'a> {
    /// Create a new experiment store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace an experiment document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure or
    /// [`DbError::Serialization`] if the document does not serialize.
    pub async fn upsert(&self, experiment: &Experiment) -> Result<(), DbError> {
        let data = serde_json::to_value(experiment)?;
        let _ = sqlx::query(
            r"INSERT INTO experiments (id, name, status, data, created_at)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (id) DO UPDATE SET name = $2, status = $3, data = $4",
        )
        .bind(experiment.id.into_inner())
        .bind(&experiment.name)
        .bind(format!("{:?}", experiment.status).to_lowercase())
        .bind(&data)
        .bind(experiment.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Load one experiment document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure,
    /// [`DbError::KeyNotFound`] when absent, or
    /// [`DbError::Serialization`] if the document does not deserialize.
    pub async fn get(&self, id: ExperimentId) -> Result<Experiment, DbError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as(r"SELECT data FROM experiments WHERE id = $1")
                .bind(id.into_inner())
                .fetch_optional(self.pool)
                .await?;
        let (data,) = row.ok_or_else(|| DbError::KeyNotFound(id.to_string()))?;
        Ok(serde_json::from_value(data)?)
    }

    /// Load all experiment documents, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure or
    /// [`DbError::Serialization`] on a bad document.
    pub async fn list(&self) -> Result<Vec<Experiment>, DbError> {
        let rows: Vec<(serde_json::Value,)> =
            sqlx::query_as(r"SELECT data FROM experiments ORDER BY created_at DESC")
                .fetch_all(self.pool)
                .await?;
        rows.into_iter()
            .map(|(data,)| serde_json::from_value(data).map_err(DbError::Serialization))
            .collect()
    }

    /// Delete an experiment document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let _ = sqlx::query(r"DELETE FROM experiments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
