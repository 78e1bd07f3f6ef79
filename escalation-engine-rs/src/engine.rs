// escalation-engine-rs/src/engine.rs
//
// Scheduler: drives one full cycle (detect + escalate, overdue sweep,
// health check, daily summary, retention) on a fixed interval, forever.
// Cycles never overlap; a failed cycle is retried after a shortened
// delay instead of terminating the loop.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::detector::PatternDetector;
use crate::escalation::EscalationManager;
use crate::health::HealthMonitor;
use crate::notify::{DailySummary, NotificationDispatcher};
use crate::retention::{RetentionManager, RetentionReport};
use crate::storage::{ErrorStore, StoreError};
use crate::types::HealthSnapshot;

/// A cycle-aborting failure. Store failures are retryable: the loop
/// logs them and runs the next cycle after the shortened delay.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub patterns: usize,
    pub escalations_created: usize,
    pub overdue_bumped: usize,
    pub health_breaches: usize,
    pub purged: RetentionReport,
    pub summary_sent: bool,
}

/// The escalation engine: owns the store handle and every component,
/// and runs them strictly in sequence each cycle.
pub struct EscalationEngine {
    store: Arc<dyn ErrorStore>,
    detector: PatternDetector,
    manager: EscalationManager,
    dispatcher: NotificationDispatcher,
    health: HealthMonitor,
    retention: RetentionManager,
    config: EngineConfig,
    last_summary_sent: Option<NaiveDate>,
}

impl EscalationEngine {
    pub fn new(
        store: Arc<dyn ErrorStore>,
        dispatcher: NotificationDispatcher,
        config: EngineConfig,
    ) -> Self {
        Self {
            detector: PatternDetector::new(config.detection_window),
            manager: EscalationManager::default(),
            dispatcher,
            health: HealthMonitor::default(),
            retention: RetentionManager::default(),
            store,
            config,
            last_summary_sent: None,
        }
    }

    /// Run one full cycle at the current wall-clock time.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one full cycle at an explicit instant. Steps run strictly in
    /// sequence; a write made by the escalation step is visible to the
    /// overdue sweep and health check of the same cycle.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let store = Arc::clone(&self.store);
        let store = store.as_ref();

        let patterns = self.detector.detect(store, now).await?;
        let created = self
            .manager
            .escalate_patterns(store, &self.dispatcher, &patterns, now)
            .await?;
        let bumped = self.manager.process_overdue(store, &self.dispatcher, now).await?;
        let (snapshot, breaches) = self.health.check(store, now).await?;
        let summary_sent = self.maybe_send_daily_summary(now, &snapshot).await;
        let purged = self.retention.sweep(store, now).await?;

        Ok(CycleReport {
            patterns: patterns.len(),
            escalations_created: created.len(),
            overdue_bumped: bumped,
            health_breaches: breaches.len(),
            purged,
            summary_sent,
        })
    }

    /// Daily summary fires inside the 09:00-09:05 window at most once
    /// per calendar day, tracked as explicit state rather than by wall
    /// clock alone.
    fn summary_due(&self, now: DateTime<Utc>) -> bool {
        now.hour() == self.config.summary_hour
            && now.minute() < 5
            && self.last_summary_sent != Some(now.date_naive())
    }

    async fn maybe_send_daily_summary(
        &mut self,
        now: DateTime<Utc>,
        snapshot: &HealthSnapshot,
    ) -> bool {
        if !self.summary_due(now) {
            return false;
        }
        let summary = DailySummary::from_snapshot(now.date_naive(), snapshot);
        let report = self.dispatcher.send_summary(&summary).await;
        info!(channels = report.attempted(), "daily summary sent");
        self.last_summary_sent = Some(now.date_naive());
        true
    }

    /// Monitoring loop: runs forever until the process is killed.
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "escalation engine monitoring started"
        );
        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        patterns = report.patterns,
                        escalations = report.escalations_created,
                        overdue = report.overdue_bumped,
                        breaches = report.health_breaches,
                        purged = report.purged.total(),
                        "cycle completed"
                    );
                    sleep(self.config.check_interval).await;
                }
                Err(err) => {
                    error!(error = %err, "cycle failed, retrying after shortened delay");
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelConfig;
    use crate::storage::InMemoryStore;
    use crate::types::{AgentTier, ErrorEvent};
    use chrono::TimeZone;

    fn engine_over(store: Arc<InMemoryStore>) -> EscalationEngine {
        let dispatcher = NotificationDispatcher::new(ChannelConfig::default()).unwrap();
        EscalationEngine::new(store, dispatcher, EngineConfig::default())
    }

    #[tokio::test]
    async fn full_cycle_escalates_recurring_errors_once() {
        let store = Arc::new(InMemoryStore::new());
        let mut engine = engine_over(store.clone());
        for _ in 0..2 {
            store
                .insert_error(&ErrorEvent::new("manager-1", AgentTier::Manager, "timeout"))
                .await
                .unwrap();
        }

        let first = engine.run_cycle().await.unwrap();
        assert_eq!(first.patterns, 1);
        assert_eq!(first.escalations_created, 1);

        let second = engine.run_cycle().await.unwrap();
        assert_eq!(second.patterns, 0);
        assert_eq!(second.escalations_created, 0);
    }

    #[tokio::test]
    async fn quiet_cycle_reports_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let mut engine = engine_over(store);

        let report = engine.run_cycle().await.unwrap();
        assert_eq!(report.patterns, 0);
        assert_eq!(report.escalations_created, 0);
        assert_eq!(report.overdue_bumped, 0);
        assert_eq!(report.health_breaches, 0);
        assert_eq!(report.purged.total(), 0);
    }

    #[tokio::test]
    async fn daily_summary_fires_once_per_day_inside_the_window() {
        let store = Arc::new(InMemoryStore::new());
        let mut engine = engine_over(store);

        let in_window = Utc.with_ymd_and_hms(2026, 3, 2, 9, 2, 0).unwrap();
        let later_same_day = Utc.with_ymd_and_hms(2026, 3, 2, 9, 4, 0).unwrap();
        let outside_window = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 3, 9, 1, 0).unwrap();

        assert!(engine.run_cycle_at(in_window).await.unwrap().summary_sent);
        assert!(!engine.run_cycle_at(later_same_day).await.unwrap().summary_sent);
        assert!(!engine.run_cycle_at(outside_window).await.unwrap().summary_sent);
        assert!(engine.run_cycle_at(next_day).await.unwrap().summary_sent);
    }
}
