// escalation-engine-rs/src/retention.rs
//
// Retention Manager: hard-deletes expired historical data each cycle.
// RED and human-flagged errors are exempt; everything else is dropped
// unconditionally once its age predicate matches.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::storage::{ErrorStore, StoreError};

/// Age thresholds past which data is eligible for deletion.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub resolved_escalation_days: i64,
    pub error_days: i64,
    pub metric_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            resolved_escalation_days: 30,
            error_days: 90,
            metric_days: 7,
        }
    }
}

/// Deletion counts for one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub escalations: u64,
    pub errors: u64,
    pub metrics: u64,
}

impl RetentionReport {
    pub fn total(&self) -> u64 {
        self.escalations + self.errors + self.metrics
    }
}

/// Purges expired, non-critical historical data.
#[derive(Default)]
pub struct RetentionManager {
    policy: RetentionPolicy,
}

impl RetentionManager {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub async fn sweep(
        &self,
        store: &dyn ErrorStore,
        now: DateTime<Utc>,
    ) -> Result<RetentionReport, StoreError> {
        let report = RetentionReport {
            escalations: store
                .purge_resolved_escalations(now - Duration::days(self.policy.resolved_escalation_days))
                .await?,
            errors: store
                .purge_old_errors(now - Duration::days(self.policy.error_days))
                .await?,
            metrics: store
                .purge_old_metrics(now - Duration::days(self.policy.metric_days))
                .await?,
        };

        if report.total() > 0 {
            info!(
                escalations = report.escalations,
                errors = report.errors,
                metrics = report.metrics,
                "retention sweep deleted expired records"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::types::{
        AgentMetric, AgentTier, ErrorEvent, ErrorStatus, EscalationRecord, EscalationStatus,
        Priority,
    };
    use uuid::Uuid;

    fn resolved_escalation(age_days: i64, now: DateTime<Utc>) -> EscalationRecord {
        EscalationRecord {
            id: Uuid::new_v4(),
            error_id: Uuid::new_v4(),
            pattern_key: Uuid::new_v4().to_string(),
            priority: Priority::Medium,
            status: EscalationStatus::Resolved,
            escalated_by: "system-auto".to_string(),
            escalated_at: now - Duration::days(age_days + 1),
            due_at: now - Duration::days(age_days),
            resolved_at: Some(now - Duration::days(age_days)),
        }
    }

    fn aged_error(status: ErrorStatus, age_days: i64, now: DateTime<Utc>) -> ErrorEvent {
        let mut event = ErrorEvent::new("specialist-1", AgentTier::Specialist, "stale");
        event.status = status;
        event.occurred_at = now - Duration::days(age_days);
        event
    }

    #[tokio::test]
    async fn resolved_escalations_age_out_at_thirty_days() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let old = resolved_escalation(31, now);
        let recent = resolved_escalation(29, now);
        store.create_escalation(&old).await.unwrap();
        store.create_escalation(&recent).await.unwrap();

        let report = RetentionManager::default().sweep(&store, now).await.unwrap();
        assert_eq!(report.escalations, 1);
        assert!(store.get_escalation(old.id).await.unwrap().is_none());
        assert!(store.get_escalation(recent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn red_errors_are_exempt_from_the_ninety_day_purge() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let red = aged_error(ErrorStatus::Red, 91, now);
        let green = aged_error(ErrorStatus::Green, 91, now);
        let fresh = aged_error(ErrorStatus::Green, 89, now);
        store.insert_error(&red).await.unwrap();
        store.insert_error(&green).await.unwrap();
        store.insert_error(&fresh).await.unwrap();

        let report = RetentionManager::default().sweep(&store, now).await.unwrap();
        assert_eq!(report.errors, 1);
        assert!(store.get_error(red.id).await.unwrap().is_some());
        assert!(store.get_error(green.id).await.unwrap().is_none());
        assert!(store.get_error(fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn metrics_older_than_seven_days_are_dropped() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for age in [8, 6] {
            store
                .record_metric(&AgentMetric {
                    id: Uuid::new_v4(),
                    agent_id: "specialist-1".to_string(),
                    success: true,
                    execution_time_ms: 10,
                    recorded_at: now - Duration::days(age),
                })
                .await
                .unwrap();
        }

        let report = RetentionManager::default().sweep(&store, now).await.unwrap();
        assert_eq!(report.metrics, 1);
    }
}
