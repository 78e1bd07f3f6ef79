// escalation-engine-rs/src/health.rs
//
// Health Monitor: stateless threshold check over the last hour of
// activity, recomputed every cycle. Alerting is a structured log;
// alerts are not deduplicated across cycles.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::storage::{ErrorStore, StoreError};
use crate::types::HealthSnapshot;

/// A breached health threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthBreach {
    /// Pending escalations exceed the backlog threshold.
    EscalationBacklog { pending: i64 },
    /// Too many RED errors in the last hour.
    CriticalErrorSurge { recent_red: i64 },
    /// Failed operations exceed twice the pending escalation count.
    FailureRate { failures: i64, pending: i64 },
}

/// Threshold configuration for the aggregate health check.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub max_pending_escalations: i64,
    pub max_recent_red_errors: i64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_pending_escalations: 10,
            max_recent_red_errors: 5,
        }
    }
}

/// Aggregates recent activity into a snapshot and raises a system-wide
/// alert when any threshold is breached.
#[derive(Default)]
pub struct HealthMonitor {
    thresholds: HealthThresholds,
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    /// Fetch a fresh snapshot and log an alert for every breach.
    pub async fn check(
        &self,
        store: &dyn ErrorStore,
        now: DateTime<Utc>,
    ) -> Result<(HealthSnapshot, Vec<HealthBreach>), StoreError> {
        let snapshot = store.health_counts(now).await?;
        let breaches = self.evaluate(&snapshot);
        for breach in &breaches {
            warn!(?breach, "system health alert");
        }
        Ok((snapshot, breaches))
    }

    /// Pure threshold evaluation.
    pub fn evaluate(&self, snapshot: &HealthSnapshot) -> Vec<HealthBreach> {
        let mut breaches = Vec::new();

        if snapshot.pending_escalations > self.thresholds.max_pending_escalations {
            breaches.push(HealthBreach::EscalationBacklog {
                pending: snapshot.pending_escalations,
            });
        }
        if snapshot.recent_red_errors > self.thresholds.max_recent_red_errors {
            breaches.push(HealthBreach::CriticalErrorSurge {
                recent_red: snapshot.recent_red_errors,
            });
        }
        if snapshot.recent_failures > snapshot.pending_escalations * 2 {
            breaches.push(HealthBreach::FailureRate {
                failures: snapshot.recent_failures,
                pending: snapshot.pending_escalations,
            });
        }

        breaches
    }
}
