// escalation-engine-rs/src/detector.rs
//
// Pattern Detector: groups recent unresolved errors into candidate
// escalation patterns. Read-only; patterns are recomputed every cycle.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::storage::{ErrorStore, StoreError};
use crate::types::{ErrorEvent, ErrorPattern};

/// Groups unresolved, not-yet-human-flagged errors by exact
/// (message, agent id) within a rolling lookback window.
pub struct PatternDetector {
    window: Duration,
    min_occurrences: usize,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            min_occurrences: 2,
        }
    }
}

impl PatternDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            min_occurrences: 2,
        }
    }

    /// Scan the error log and return every pattern that qualifies for
    /// escalation. Errors already flagged for a human are excluded by
    /// the store query, which is what keeps repeat cycles from
    /// re-escalating the same events.
    pub async fn detect(
        &self,
        store: &dyn ErrorStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<ErrorPattern>, StoreError> {
        let events = store.unresolved_errors_since(now - self.window).await?;
        let patterns = self.group_events(events);
        debug!(patterns = patterns.len(), "pattern detection completed");
        Ok(patterns)
    }

    /// Exact-string grouping; no fuzzy or semantic matching.
    fn group_events(&self, events: Vec<ErrorEvent>) -> Vec<ErrorPattern> {
        let mut groups: HashMap<(String, String), Vec<ErrorEvent>> = HashMap::new();
        for event in events {
            groups
                .entry((event.message.clone(), event.agent_id.clone()))
                .or_default()
                .push(event);
        }

        groups
            .into_iter()
            .filter(|(_, members)| members.len() >= self.min_occurrences)
            .map(|((message, agent_id), mut members)| {
                // Most recent first. Groups are never empty here.
                members.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
                let last_seen = members[0].occurred_at;
                let first_seen = members[members.len() - 1].occurred_at;
                ErrorPattern {
                    message,
                    agent_id,
                    occurrences: members.len(),
                    first_seen,
                    last_seen,
                    error_ids: members.iter().map(|e| e.id).collect(),
                }
            })
            .collect()
    }
}
