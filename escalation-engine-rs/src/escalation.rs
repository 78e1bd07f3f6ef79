// escalation-engine-rs/src/escalation.rs
//
// Escalation Manager: turns qualifying error patterns into escalation
// queue entries with SLA due dates, flags member errors for mandatory
// human review, and re-prioritizes overdue entries.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notify::{EscalationNotice, NotificationDispatcher};
use crate::priority;
use crate::storage::{ErrorStore, StoreError};
use crate::types::{ErrorPattern, EscalationRecord, EscalationStatus, TrainingRecord};

/// Creates and maintains escalation queue entries.
pub struct EscalationManager {
    escalated_by: String,
}

impl Default for EscalationManager {
    fn default() -> Self {
        Self {
            escalated_by: "system-auto".to_string(),
        }
    }
}

impl EscalationManager {
    /// Escalate every qualifying pattern. Each pattern is claimed
    /// through the store's idempotent create; a pattern that already
    /// has a PENDING entry is skipped, which makes repeat cycles and
    /// overlapping writers safe.
    pub async fn escalate_patterns(
        &self,
        store: &dyn ErrorStore,
        dispatcher: &NotificationDispatcher,
        patterns: &[ErrorPattern],
        now: DateTime<Utc>,
    ) -> Result<Vec<EscalationRecord>, StoreError> {
        let mut created = Vec::new();

        for pattern in patterns {
            let Some(error_id) = pattern.latest_error_id() else {
                continue;
            };
            let priority = priority::classify(pattern.occurrences, &pattern.agent_id);
            let record = EscalationRecord {
                id: Uuid::new_v4(),
                error_id,
                pattern_key: pattern.key(),
                priority,
                status: EscalationStatus::Pending,
                escalated_by: self.escalated_by.clone(),
                escalated_at: now,
                due_at: now + priority.sla(),
                resolved_at: None,
            };

            if !store.create_escalation(&record).await? {
                debug!(
                    agent_id = %pattern.agent_id,
                    "pattern already pending escalation, skipping"
                );
                continue;
            }

            store.mark_errors_escalated(&pattern.error_ids).await?;
            store
                .append_training(&TrainingRecord {
                    id: Uuid::new_v4(),
                    intervention: "auto_escalation".to_string(),
                    agent_id: pattern.agent_id.clone(),
                    problem: format!("error pattern detected: {}", pattern.message),
                    action: format!("escalated for human review at {priority} priority"),
                    success: true,
                    recurring: true,
                    pattern_recognized: true,
                    error_id,
                    recorded_at: now,
                })
                .await?;

            let report = dispatcher
                .dispatch(&EscalationNotice::created(&record, pattern))
                .await;
            info!(
                escalation_id = %record.id,
                priority = %priority,
                agent_id = %pattern.agent_id,
                occurrences = pattern.occurrences,
                channels = report.attempted(),
                "escalation created"
            );

            created.push(record);
        }

        Ok(created)
    }

    /// Overdue sweep: bump every PENDING entry past its due date one
    /// priority level (capped at CRITICAL) and re-arm the due date from
    /// the new SLA. An entry whose linked error was independently
    /// resolved is left untouched for a human to close.
    pub async fn process_overdue(
        &self,
        store: &dyn ErrorStore,
        dispatcher: &NotificationDispatcher,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let overdue = store.overdue_escalations(now).await?;
        let mut bumped = 0;

        for record in overdue {
            if store.error_resolved(record.error_id).await? {
                debug!(
                    escalation_id = %record.id,
                    "linked error resolved externally, skipping overdue bump"
                );
                continue;
            }

            let new_priority = record.priority.escalate();
            let new_due = now + new_priority.sla();
            store
                .update_escalation_schedule(record.id, new_priority, new_due)
                .await?;
            warn!(
                escalation_id = %record.id,
                from = %record.priority,
                to = %new_priority,
                "escalation overdue, priority raised"
            );

            dispatcher
                .dispatch(&EscalationNotice::overdue(&record, new_priority, now))
                .await;
            bumped += 1;
        }

        Ok(bumped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::PatternDetector;
    use crate::notify::ChannelConfig;
    use crate::storage::InMemoryStore;
    use crate::types::{AgentTier, ErrorEvent, ErrorStatus, Priority};
    use chrono::Duration;

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new(ChannelConfig::default()).unwrap()
    }

    async fn seed_pattern(store: &InMemoryStore, agent: &str, message: &str, count: usize) {
        for _ in 0..count {
            store
                .insert_error(&ErrorEvent::new(agent, AgentTier::Specialist, message))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn escalation_flags_members_and_sets_sla_due_date() {
        let store = InMemoryStore::new();
        let manager = EscalationManager::default();
        let now = Utc::now();
        seed_pattern(&store, "specialist-1", "timeout", 2).await;

        let patterns = PatternDetector::default().detect(&store, now).await.unwrap();
        let created = manager
            .escalate_patterns(&store, &dispatcher(), &patterns, now)
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        let record = &created[0];
        assert_eq!(record.priority, Priority::Low);
        assert_eq!(record.due_at, now + Priority::Low.sla());
        assert_eq!(record.status, EscalationStatus::Pending);

        for id in &patterns[0].error_ids {
            let event = store.get_error(*id).await.unwrap().unwrap();
            assert!(event.requires_human);
            assert_eq!(event.escalation_level, 2);
            assert_eq!(event.status, ErrorStatus::Red);
        }
        assert_eq!(store.training_count().await, 1);
    }

    #[tokio::test]
    async fn second_cycle_does_not_duplicate_an_escalation() {
        let store = InMemoryStore::new();
        let manager = EscalationManager::default();
        let detector = PatternDetector::default();
        let now = Utc::now();
        seed_pattern(&store, "specialist-1", "timeout", 2).await;

        let patterns = detector.detect(&store, now).await.unwrap();
        let first = manager
            .escalate_patterns(&store, &dispatcher(), &patterns, now)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // The flagged errors drop out of detection scope.
        let rescan = detector.detect(&store, now).await.unwrap();
        assert!(rescan.is_empty());

        // Even a raced duplicate of the same pattern is refused by the claim.
        let second = manager
            .escalate_patterns(&store, &dispatcher(), &patterns, now)
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(store.training_count().await, 1);
    }

    #[tokio::test]
    async fn overdue_pending_high_becomes_critical_with_rearmed_due() {
        let store = InMemoryStore::new();
        let manager = EscalationManager::default();
        let now = Utc::now();

        let record = EscalationRecord {
            id: Uuid::new_v4(),
            error_id: Uuid::new_v4(),
            pattern_key: "k1".to_string(),
            priority: Priority::High,
            status: EscalationStatus::Pending,
            escalated_by: "system-auto".to_string(),
            escalated_at: now - Duration::hours(6),
            due_at: now - Duration::hours(2),
            resolved_at: None,
        };
        store.create_escalation(&record).await.unwrap();

        let bumped = manager
            .process_overdue(&store, &dispatcher(), now)
            .await
            .unwrap();
        assert_eq!(bumped, 1);

        let updated = store.get_escalation(record.id).await.unwrap().unwrap();
        assert_eq!(updated.priority, Priority::Critical);
        assert_eq!(updated.due_at, now + Priority::Critical.sla());

        // A later sweep keeps CRITICAL but still pushes the due date.
        let later = now + Duration::hours(2);
        manager
            .process_overdue(&store, &dispatcher(), later)
            .await
            .unwrap();
        let again = store.get_escalation(record.id).await.unwrap().unwrap();
        assert_eq!(again.priority, Priority::Critical);
        assert_eq!(again.due_at, later + Priority::Critical.sla());
    }

    #[tokio::test]
    async fn overdue_sweep_skips_externally_resolved_errors() {
        let store = InMemoryStore::new();
        let manager = EscalationManager::default();
        let now = Utc::now();

        let event = ErrorEvent::new("specialist-1", AgentTier::Specialist, "timeout");
        store.insert_error(&event).await.unwrap();
        let record = EscalationRecord {
            id: Uuid::new_v4(),
            error_id: event.id,
            pattern_key: "k2".to_string(),
            priority: Priority::Medium,
            status: EscalationStatus::Pending,
            escalated_by: "system-auto".to_string(),
            escalated_at: now - Duration::hours(30),
            due_at: now - Duration::hours(1),
            resolved_at: None,
        };
        store.create_escalation(&record).await.unwrap();
        store.mark_error_resolved(event.id).await.unwrap();

        let bumped = manager
            .process_overdue(&store, &dispatcher(), now)
            .await
            .unwrap();
        assert_eq!(bumped, 0);

        let unchanged = store.get_escalation(record.id).await.unwrap().unwrap();
        assert_eq!(unchanged.priority, Priority::Medium);
        assert_eq!(unchanged.due_at, record.due_at);
    }
}
