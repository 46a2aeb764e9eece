//! Durable event persistence.
//!
//! The in-memory event log is the live read path; every committed event
//! also lands here, carrying its already-assigned global version. On
//! startup [`EventStore::max_version`] recovers the high-water mark so the
//! in-memory counter resumes gap-free.

use habitat_types::WorldEvent;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Default batch size for event inserts.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Operations on the `events` table.
pub struct EventStore<'a> {
    pool: &'a PgPool,
    batch_size: usize,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size for inserts.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Batch-insert events, typically all events from one tick.
    ///
    /// Each batch runs in a transaction: all rows in the batch commit or
    /// none do. Versions were assigned by the in-memory log; the UNIQUE
    /// constraint makes accidental double-flushes loud.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn batch_insert(&self, events: &[WorldEvent]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        for chunk in events.chunks(self.batch_size) {
            let mut tx = self.pool.begin().await?;

            for event in chunk {
                let agent_id: Option<Uuid> =
                    event.agent_id.map(habitat_types::AgentId::into_inner);

                let _ = sqlx::query(
                    r"INSERT INTO events (version, tick, type, agent_id, payload, created_at)
                      VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(i64::try_from(event.version).unwrap_or(i64::MAX))
                .bind(i64::try_from(event.tick).unwrap_or(i64::MAX))
                .bind(event.event_type.as_str())
                .bind(agent_id)
                .bind(&event.payload)
                .bind(event.created_at)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
        }

        tracing::debug!(count = events.len(), "Persisted events");
        Ok(())
    }

    /// Recover the largest persisted version (0 when the table is empty).
    ///
    /// Must be consulted before the engine accepts new events on startup.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn max_version(&self) -> Result<u64, DbError> {
        let row: (Option<i64>,) =
            sqlx::query_as(r"SELECT MAX(version) FROM events")
                .fetch_one(self.pool)
                .await?;
        Ok(row.0.map_or(0, |v| u64::try_from(v).unwrap_or(0)))
    }

    /// Events at an exact tick, version order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn by_tick(&self, tick: u64) -> Result<Vec<EventRow>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT version, tick, type, agent_id, payload, created_at
              FROM events
              WHERE tick = $1
              ORDER BY version",
        )
        .bind(i64::try_from(tick).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Events in an inclusive tick range, version order, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn in_range(
        &self,
        from_tick: u64,
        to_tick: u64,
        limit: i64,
    ) -> Result<Vec<EventRow>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT version, tick, type, agent_id, payload, created_at
              FROM events
              WHERE tick >= $1 AND tick <= $2
              ORDER BY version
              LIMIT $3",
        )
        .bind(i64::try_from(from_tick).unwrap_or(i64::MAX))
        .bind(i64::try_from(to_tick).unwrap_or(i64::MAX))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The newest events involving an agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn by_agent(&self, agent_id: Uuid, limit: i64) -> Result<Vec<EventRow>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT version, tick, type, agent_id, payload, created_at
              FROM events
              WHERE agent_id = $1
              ORDER BY version DESC
              LIMIT $2",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Distinct ticks with at least one event, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn ticks(&self) -> Result<Vec<u64>, DbError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as(r"SELECT DISTINCT tick FROM events ORDER BY tick")
                .fetch_all(self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(t,)| u64::try_from(t).unwrap_or(0))
            .collect())
    }
}

/// A row from the `events` table.
///
/// Runtime types rather than compile-time checked ones so the workspace
/// builds without a live database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Global monotonic version.
    pub version: i64,
    /// The tick when this event occurred.
    pub tick: i64,
    /// Event type as its canonical string.
    #[sqlx(rename = "type")]
    pub event_type: String,
    /// Primary agent involved, if any.
    pub agent_id: Option<Uuid>,
    /// Type-specific payload.
    pub payload: serde_json::Value,
    /// Wall-clock timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}
