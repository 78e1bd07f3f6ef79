// escalation-engine-rs/src/storage.rs
//
// Storage backend abstraction for the escalation engine
// Provides:
// - The read/write contract the engine runs against (error log,
//   escalation queue, training log, agent metrics)
// - An in-memory backend for tests and development
// - A PostgreSQL backend for deployment

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{
    AgentMetric, ErrorEvent, ErrorStatus, EscalationRecord, EscalationStatus, HealthSnapshot,
    ParseEnumError, Priority, TrainingRecord,
};

/// Failures surfaced by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid value in column {column}: {value}")]
    Decode { column: String, value: String },

    #[error("escalation not found: {0}")]
    EscalationNotFound(Uuid),
}

fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    value.parse().map_err(|_| StoreError::Decode {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Read/write surface the engine consumes.
///
/// Error events and metrics are created by the external submission
/// surface; the engine mutates error flags, owns the escalation queue
/// and training log, and ages everything out.
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Initialize the backend (create tables where applicable).
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Check if the backend is reachable.
    async fn is_healthy(&self) -> bool;

    /// Append a new error event (submission surface write path).
    async fn insert_error(&self, event: &ErrorEvent) -> Result<(), StoreError>;

    /// Fetch an error event by id.
    async fn get_error(&self, id: Uuid) -> Result<Option<ErrorEvent>, StoreError>;

    /// Unresolved, not-yet-human-flagged events observed since `since`.
    async fn unresolved_errors_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ErrorEvent>, StoreError>;

    /// Flag the given errors as escalated: `requires_human = true`,
    /// `escalation_level = 2`, status forced to RED.
    async fn mark_errors_escalated(&self, ids: &[Uuid]) -> Result<(), StoreError>;

    /// Mark an error event resolved (external resolution workflow).
    async fn mark_error_resolved(&self, id: Uuid) -> Result<(), StoreError>;

    /// Whether the error has been resolved. Missing events count as
    /// unresolved since no resolution evidence exists.
    async fn error_resolved(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.get_error(id).await?.map(|e| e.resolved).unwrap_or(false))
    }

    /// Atomically claim a new escalation. Returns `false` without
    /// writing when a PENDING record with the same `pattern_key`
    /// already exists.
    async fn create_escalation(&self, record: &EscalationRecord) -> Result<bool, StoreError>;

    /// Fetch an escalation record by id.
    async fn get_escalation(&self, id: Uuid) -> Result<Option<EscalationRecord>, StoreError>;

    /// PENDING escalations whose due date has passed.
    async fn overdue_escalations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EscalationRecord>, StoreError>;

    /// Re-prioritize an escalation and push its due date forward.
    async fn update_escalation_schedule(
        &self,
        id: Uuid,
        priority: Priority,
        due_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Terminate an escalation (external resolution action).
    async fn resolve_escalation(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Append an immutable training/audit record.
    async fn append_training(&self, record: &TrainingRecord) -> Result<(), StoreError>;

    /// Append an agent operation metric (submission surface write path).
    async fn record_metric(&self, metric: &AgentMetric) -> Result<(), StoreError>;

    /// Aggregate counts over the hour preceding `now`.
    async fn health_counts(&self, now: DateTime<Utc>) -> Result<HealthSnapshot, StoreError>;

    /// Delete RESOLVED escalations resolved before `cutoff`. Returns the
    /// number deleted.
    async fn purge_resolved_escalations(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Delete non-RED, non-human-flagged errors older than `cutoff`.
    async fn purge_old_errors(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Delete metrics older than `cutoff`.
    async fn purge_old_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemInner {
    errors: HashMap<Uuid, ErrorEvent>,
    escalations: HashMap<Uuid, EscalationRecord>,
    training: Vec<TrainingRecord>,
    metrics: Vec<AgentMetric>,
}

/// In-memory storage backend for testing and development.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<MemInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of training records written so far (test support).
    pub async fn training_count(&self) -> usize {
        self.inner.read().await.training.len()
    }
}

#[async_trait]
impl ErrorStore for InMemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        info!("in-memory store initialized");
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn insert_error(&self, event: &ErrorEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.errors.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_error(&self, id: Uuid) -> Result<Option<ErrorEvent>, StoreError> {
        Ok(self.inner.read().await.errors.get(&id).cloned())
    }

    async fn unresolved_errors_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ErrorEvent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .errors
            .values()
            .filter(|e| !e.resolved && !e.requires_human && e.occurred_at >= since)
            .cloned()
            .collect())
    }

    async fn mark_errors_escalated(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for id in ids {
            if let Some(event) = inner.errors.get_mut(id) {
                event.requires_human = true;
                event.escalation_level = 2;
                event.status = ErrorStatus::Red;
            }
        }
        Ok(())
    }

    async fn mark_error_resolved(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(event) = inner.errors.get_mut(&id) {
            event.resolved = true;
        }
        Ok(())
    }

    async fn create_escalation(&self, record: &EscalationRecord) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let already_pending = inner.escalations.values().any(|e| {
            e.pattern_key == record.pattern_key && e.status == EscalationStatus::Pending
        });
        if already_pending {
            return Ok(false);
        }
        inner.escalations.insert(record.id, record.clone());
        Ok(true)
    }

    async fn get_escalation(&self, id: Uuid) -> Result<Option<EscalationRecord>, StoreError> {
        Ok(self.inner.read().await.escalations.get(&id).cloned())
    }

    async fn overdue_escalations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EscalationRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .escalations
            .values()
            .filter(|e| e.status == EscalationStatus::Pending && e.due_at < now)
            .cloned()
            .collect())
    }

    async fn update_escalation_schedule(
        &self,
        id: Uuid,
        priority: Priority,
        due_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .escalations
            .get_mut(&id)
            .ok_or(StoreError::EscalationNotFound(id))?;
        record.priority = priority;
        record.due_at = due_at;
        Ok(())
    }

    async fn resolve_escalation(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .escalations
            .get_mut(&id)
            .ok_or(StoreError::EscalationNotFound(id))?;
        record.status = EscalationStatus::Resolved;
        record.resolved_at = Some(at);
        Ok(())
    }

    async fn append_training(&self, record: &TrainingRecord) -> Result<(), StoreError> {
        self.inner.write().await.training.push(record.clone());
        Ok(())
    }

    async fn record_metric(&self, metric: &AgentMetric) -> Result<(), StoreError> {
        self.inner.write().await.metrics.push(metric.clone());
        Ok(())
    }

    async fn health_counts(&self, now: DateTime<Utc>) -> Result<HealthSnapshot, StoreError> {
        let hour_ago = now - Duration::hours(1);
        let inner = self.inner.read().await;

        let pending_escalations = inner
            .escalations
            .values()
            .filter(|e| e.status == EscalationStatus::Pending)
            .count() as i64;
        let recent_red_errors = inner
            .errors
            .values()
            .filter(|e| e.status == ErrorStatus::Red && e.occurred_at >= hour_ago)
            .count() as i64;
        let recent: Vec<&AgentMetric> = inner
            .metrics
            .iter()
            .filter(|m| m.recorded_at >= hour_ago)
            .collect();
        let recent_failures = recent.iter().filter(|m| !m.success).count() as i64;
        let avg_execution_ms = if recent.is_empty() {
            None
        } else {
            let sum: i64 = recent.iter().map(|m| m.execution_time_ms).sum();
            Some(sum as f64 / recent.len() as f64)
        };

        Ok(HealthSnapshot {
            pending_escalations,
            recent_red_errors,
            recent_failures,
            avg_execution_ms,
            taken_at: now,
        })
    }

    async fn purge_resolved_escalations(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.escalations.len();
        inner.escalations.retain(|_, e| {
            !(e.status == EscalationStatus::Resolved
                && e.resolved_at.map(|at| at < cutoff).unwrap_or(false))
        });
        Ok((before - inner.escalations.len()) as u64)
    }

    async fn purge_old_errors(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.errors.len();
        inner.errors.retain(|_, e| {
            !(e.occurred_at < cutoff && e.status != ErrorStatus::Red && !e.requires_human)
        });
        Ok((before - inner.errors.len()) as u64)
    }

    async fn purge_old_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.metrics.len();
        inner.metrics.retain(|m| m.recorded_at >= cutoff);
        Ok((before - inner.metrics.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL backend
// ---------------------------------------------------------------------------

/// PostgreSQL storage backend.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to PostgreSQL.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }
}

fn error_from_row(row: &PgRow) -> Result<ErrorEvent, StoreError> {
    let tier: String = row.try_get("tier")?;
    let status: String = row.try_get("status")?;
    Ok(ErrorEvent {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        tier: parse_column("tier", &tier)?,
        message: row.try_get("message")?,
        category: row.try_get("category")?,
        status: parse_column("status", &status)?,
        occurred_at: row.try_get("occurred_at")?,
        resolved: row.try_get("resolved")?,
        requires_human: row.try_get("requires_human")?,
        escalation_level: row.try_get("escalation_level")?,
    })
}

fn escalation_from_row(row: &PgRow) -> Result<EscalationRecord, StoreError> {
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    Ok(EscalationRecord {
        id: row.try_get("id")?,
        error_id: row.try_get("error_id")?,
        pattern_key: row.try_get("pattern_key")?,
        priority: parse_column("priority", &priority)?,
        status: parse_column("status", &status)?,
        escalated_by: row.try_get("escalated_by")?,
        escalated_at: row.try_get("escalated_at")?,
        due_at: row.try_get("due_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

#[async_trait]
impl ErrorStore for PgStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_error_log (
                id UUID PRIMARY KEY,
                agent_id TEXT NOT NULL,
                tier TEXT NOT NULL,
                message TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                resolved BOOLEAN NOT NULL DEFAULT FALSE,
                requires_human BOOLEAN NOT NULL DEFAULT FALSE,
                escalation_level INT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS escalation_queue (
                id UUID PRIMARY KEY,
                error_id UUID NOT NULL,
                pattern_key TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                escalated_by TEXT NOT NULL,
                escalated_at TIMESTAMPTZ NOT NULL,
                due_at TIMESTAMPTZ NOT NULL,
                resolved_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Backs the atomic claim in create_escalation: at most one
        // PENDING record per pattern.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_escalation_pending_pattern
            ON escalation_queue (pattern_key)
            WHERE status = 'PENDING'
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS training_log (
                id UUID PRIMARY KEY,
                intervention TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                problem TEXT NOT NULL,
                action TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                recurring BOOLEAN NOT NULL,
                pattern_recognized BOOLEAN NOT NULL,
                error_id UUID NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_metrics (
                id UUID PRIMARY KEY,
                agent_id TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                execution_time_ms BIGINT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("postgresql store initialized");
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn insert_error(&self, event: &ErrorEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO agent_error_log (
                id, agent_id, tier, message, category, status,
                occurred_at, resolved, requires_human, escalation_level
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.id)
        .bind(&event.agent_id)
        .bind(event.tier.as_str())
        .bind(&event.message)
        .bind(&event.category)
        .bind(event.status.as_str())
        .bind(event.occurred_at)
        .bind(event.resolved)
        .bind(event.requires_human)
        .bind(event.escalation_level)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_error(&self, id: Uuid) -> Result<Option<ErrorEvent>, StoreError> {
        let row = sqlx::query("SELECT * FROM agent_error_log WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(error_from_row).transpose()
    }

    async fn unresolved_errors_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ErrorEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM agent_error_log
            WHERE occurred_at >= $1
              AND resolved = FALSE
              AND requires_human = FALSE
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(error_from_row).collect()
    }

    async fn mark_errors_escalated(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE agent_error_log
            SET requires_human = TRUE,
                escalation_level = 2,
                status = 'RED'
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .execute(&self.pool)
        .await?;
        debug!(count = ids.len(), "marked errors escalated");
        Ok(())
    }

    async fn mark_error_resolved(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE agent_error_log SET resolved = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn error_resolved(&self, id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT resolved FROM agent_error_log WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => row.try_get("resolved")?,
            None => false,
        })
    }

    async fn create_escalation(&self, record: &EscalationRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO escalation_queue (
                id, error_id, pattern_key, priority, status,
                escalated_by, escalated_at, due_at, resolved_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (pattern_key) WHERE status = 'PENDING' DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.error_id)
        .bind(&record.pattern_key)
        .bind(record.priority.as_str())
        .bind(record.status.as_str())
        .bind(&record.escalated_by)
        .bind(record.escalated_at)
        .bind(record.due_at)
        .bind(record.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_escalation(&self, id: Uuid) -> Result<Option<EscalationRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM escalation_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(escalation_from_row).transpose()
    }

    async fn overdue_escalations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EscalationRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM escalation_queue
            WHERE status = 'PENDING' AND due_at < $1
            ORDER BY due_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(escalation_from_row).collect()
    }

    async fn update_escalation_schedule(
        &self,
        id: Uuid,
        priority: Priority,
        due_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE escalation_queue SET priority = $1, due_at = $2 WHERE id = $3",
        )
        .bind(priority.as_str())
        .bind(due_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::EscalationNotFound(id));
        }
        Ok(())
    }

    async fn resolve_escalation(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE escalation_queue SET status = 'RESOLVED', resolved_at = $1 WHERE id = $2",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::EscalationNotFound(id));
        }
        Ok(())
    }

    async fn append_training(&self, record: &TrainingRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO training_log (
                id, intervention, agent_id, problem, action,
                success, recurring, pattern_recognized, error_id, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(&record.intervention)
        .bind(&record.agent_id)
        .bind(&record.problem)
        .bind(&record.action)
        .bind(record.success)
        .bind(record.recurring)
        .bind(record.pattern_recognized)
        .bind(record.error_id)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_metric(&self, metric: &AgentMetric) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO agent_metrics (id, agent_id, success, execution_time_ms, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(metric.id)
        .bind(&metric.agent_id)
        .bind(metric.success)
        .bind(metric.execution_time_ms)
        .bind(metric.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_counts(&self, now: DateTime<Utc>) -> Result<HealthSnapshot, StoreError> {
        let hour_ago = now - Duration::hours(1);
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM escalation_queue
                 WHERE status = 'PENDING') AS pending_escalations,
                (SELECT COUNT(*) FROM agent_error_log
                 WHERE status = 'RED' AND occurred_at >= $1) AS recent_red_errors,
                (SELECT COUNT(*) FROM agent_metrics
                 WHERE success = FALSE AND recorded_at >= $1) AS recent_failures,
                (SELECT AVG(execution_time_ms)::DOUBLE PRECISION FROM agent_metrics
                 WHERE recorded_at >= $1) AS avg_execution_ms
            "#,
        )
        .bind(hour_ago)
        .fetch_one(&self.pool)
        .await?;

        Ok(HealthSnapshot {
            pending_escalations: row.try_get("pending_escalations")?,
            recent_red_errors: row.try_get("recent_red_errors")?,
            recent_failures: row.try_get("recent_failures")?,
            avg_execution_ms: row.try_get("avg_execution_ms")?,
            taken_at: now,
        })
    }

    async fn purge_resolved_escalations(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM escalation_queue WHERE status = 'RESOLVED' AND resolved_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_old_errors(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM agent_error_log
            WHERE occurred_at < $1
              AND status != 'RED'
              AND requires_human = FALSE
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_old_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM agent_metrics WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentTier, Priority};

    fn pending_record(key: &str) -> EscalationRecord {
        let now = Utc::now();
        EscalationRecord {
            id: Uuid::new_v4(),
            error_id: Uuid::new_v4(),
            pattern_key: key.to_string(),
            priority: Priority::Medium,
            status: EscalationStatus::Pending,
            escalated_by: "system-auto".to_string(),
            escalated_at: now,
            due_at: now + Duration::hours(24),
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn escalation_claim_refuses_duplicate_pending_key() {
        let store = InMemoryStore::new();
        let first = pending_record("abc");
        let second = pending_record("abc");

        assert!(store.create_escalation(&first).await.unwrap());
        assert!(!store.create_escalation(&second).await.unwrap());

        // A resolved record releases the key for a fresh claim.
        store.resolve_escalation(first.id, Utc::now()).await.unwrap();
        assert!(store.create_escalation(&second).await.unwrap());
    }

    #[tokio::test]
    async fn escalated_errors_leave_detection_scope() {
        let store = InMemoryStore::new();
        let event = ErrorEvent::new("specialist-1", AgentTier::Specialist, "timeout");
        store.insert_error(&event).await.unwrap();

        store.mark_errors_escalated(&[event.id]).await.unwrap();

        let visible = store
            .unresolved_errors_since(Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert!(visible.is_empty());

        let stored = store.get_error(event.id).await.unwrap().unwrap();
        assert!(stored.requires_human);
        assert_eq!(stored.escalation_level, 2);
        assert_eq!(stored.status, ErrorStatus::Red);
    }

    #[tokio::test]
    async fn health_counts_aggregate_last_hour() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        store.create_escalation(&pending_record("k1")).await.unwrap();

        let mut red = ErrorEvent::new("manager-1", AgentTier::Manager, "fatal");
        red.status = ErrorStatus::Red;
        store.insert_error(&red).await.unwrap();

        let mut stale_red = ErrorEvent::new("manager-1", AgentTier::Manager, "fatal");
        stale_red.status = ErrorStatus::Red;
        stale_red.occurred_at = now - Duration::hours(2);
        store.insert_error(&stale_red).await.unwrap();

        store
            .record_metric(&AgentMetric {
                id: Uuid::new_v4(),
                agent_id: "specialist-1".to_string(),
                success: false,
                execution_time_ms: 120,
                recorded_at: now,
            })
            .await
            .unwrap();

        let snapshot = store.health_counts(now).await.unwrap();
        assert_eq!(snapshot.pending_escalations, 1);
        assert_eq!(snapshot.recent_red_errors, 1);
        assert_eq!(snapshot.recent_failures, 1);
        assert_eq!(snapshot.avg_execution_ms, Some(120.0));
    }
}
