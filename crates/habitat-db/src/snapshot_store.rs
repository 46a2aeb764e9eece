//! Durable world snapshot persistence.
//!
//! Snapshots are captured when a variant completes (and on demand). They
//! are JSONB blobs keyed by experiment/variant so post-hoc analysis can
//! diff final worlds across variants.

use habitat_types::{ExperimentId, VariantId, WorldSnapshot};
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `snapshots` table.
pub struct SnapshotStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SnapshotStore<'a> {
    /// Create a new snapshot store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a snapshot, optionally tagged with its experiment context.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure or
    /// [`DbError::Serialization`] if the snapshot does not serialize.
    pub async fn insert(
        &self,
        snapshot: &WorldSnapshot,
        experiment_id: Option<ExperimentId>,
        variant_id: Option<VariantId>,
    ) -> Result<(), DbError> {
        let data = serde_json::to_value(snapshot)?;
        let _ = sqlx::query(
            r"INSERT INTO snapshots (experiment_id, variant_id, tick, data)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(experiment_id.map(ExperimentId::into_inner))
        .bind(variant_id.map(VariantId::into_inner))
        .bind(i64::try_from(snapshot.tick).unwrap_or(i64::MAX))
        .bind(&data)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Load the most recent snapshot for a variant, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure or
    /// [`DbError::Serialization`] on a bad document.
    pub async fn latest_for_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<Option<WorldSnapshot>, DbError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r"SELECT data FROM snapshots WHERE variant_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(variant_id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        row.map(|(data,)| serde_json::from_value(data).map_err(DbError::Serialization))
            .transpose()
    }
}
