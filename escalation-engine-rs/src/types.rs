//! # Domain Types
//!
//! Core data model shared by every component of the escalation engine:
//! error events, derived error patterns, escalation queue entries,
//! training/audit records, agent metrics and health snapshots.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Raised when a stored enum value does not match any known variant.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized value: {0}")]
pub struct ParseEnumError(pub String);

/// Position of the originating agent in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentTier {
    Orchestrator,
    Manager,
    Specialist,
}

impl AgentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentTier::Orchestrator => "orchestrator",
            AgentTier::Manager => "manager",
            AgentTier::Specialist => "specialist",
        }
    }
}

impl fmt::Display for AgentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orchestrator" => Ok(AgentTier::Orchestrator),
            "manager" => Ok(AgentTier::Manager),
            "specialist" => Ok(AgentTier::Specialist),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Traffic-light severity status of an error event.
///
/// Everything is GREEN unless flagged; the escalation manager forces
/// escalated errors to RED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorStatus {
    Green,
    Yellow,
    Red,
}

impl ErrorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Green => "GREEN",
            ErrorStatus::Yellow => "YELLOW",
            ErrorStatus::Red => "RED",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GREEN" => Ok(ErrorStatus::Green),
            "YELLOW" => Ok(ErrorStatus::Yellow),
            "RED" => Ok(ErrorStatus::Red),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Escalation priority, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    /// Next priority level for overdue escalations, capped at Critical.
    pub fn escalate(&self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Critical,
            Priority::Critical => Priority::Critical,
        }
    }

    /// Maximum response time allowed before an escalation at this
    /// priority is considered overdue.
    pub fn sla(&self) -> Duration {
        match self {
            Priority::Critical => Duration::hours(1),
            Priority::High => Duration::hours(4),
            Priority::Medium => Duration::hours(24),
            Priority::Low => Duration::hours(72),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "CRITICAL" => Ok(Priority::Critical),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Lifecycle state of an escalation queue entry.
///
/// Terminal state `Resolved` is reached only through an external
/// resolution action, never by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EscalationStatus {
    Pending,
    Resolved,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::Pending => "PENDING",
            EscalationStatus::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscalationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EscalationStatus::Pending),
            "RESOLVED" => Ok(EscalationStatus::Resolved),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// A single entry in the centralized error log.
///
/// Created by the external submission surface; the engine only flips
/// `requires_human`, bumps `escalation_level` and forces RED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub id: Uuid,
    pub agent_id: String,
    pub tier: AgentTier,
    pub message: String,
    pub category: String,
    pub status: ErrorStatus,
    pub occurred_at: DateTime<Utc>,
    pub resolved: bool,
    pub requires_human: bool,
    pub escalation_level: i32,
}

impl ErrorEvent {
    /// New unresolved GREEN event, the shape the submission surface writes.
    pub fn new(agent_id: impl Into<String>, tier: AgentTier, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            tier,
            message: message.into(),
            category: "operation".to_string(),
            status: ErrorStatus::Green,
            occurred_at: Utc::now(),
            resolved: false,
            requires_human: false,
            escalation_level: 0,
        }
    }
}

/// A recurring-failure group: error events sharing identical message
/// text and originating agent inside the detection window.
///
/// Derived fresh each cycle and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPattern {
    pub message: String,
    pub agent_id: String,
    pub occurrences: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Member error ids, most recent first.
    pub error_ids: Vec<Uuid>,
}

impl ErrorPattern {
    /// Stable idempotency key for this pattern: two cycles that observe
    /// the same (agent, message) pair produce the same key, so at most
    /// one PENDING escalation can exist for it.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.agent_id.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.message.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Id of the most recent member error, used as the record's anchor.
    pub fn latest_error_id(&self) -> Option<Uuid> {
        self.error_ids.first().copied()
    }
}

/// An escalation queue entry awaiting human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: Uuid,
    pub error_id: Uuid,
    pub pattern_key: String,
    pub priority: Priority,
    pub status: EscalationStatus,
    pub escalated_by: String,
    pub escalated_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Immutable audit entry written for every automated intervention.
///
/// Append-only; the engine never reads these back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub id: Uuid,
    pub intervention: String,
    pub agent_id: String,
    pub problem: String,
    pub action: String,
    pub success: bool,
    pub recurring: bool,
    pub pattern_recognized: bool,
    pub error_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

/// One recorded agent operation, written by the submission surface.
/// The engine reads these for health aggregation and ages them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetric {
    pub id: Uuid,
    pub agent_id: String,
    pub success: bool,
    pub execution_time_ms: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate counts over the last hour, recomputed each cycle and
/// compared against thresholds. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub pending_escalations: i64,
    pub recent_red_errors: i64,
    pub recent_failures: i64,
    pub avg_execution_ms: Option<f64>,
    pub taken_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_totally_ordered() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn escalate_caps_at_critical() {
        assert_eq!(Priority::Low.escalate(), Priority::Medium);
        assert_eq!(Priority::High.escalate(), Priority::Critical);
        assert_eq!(Priority::Critical.escalate(), Priority::Critical);
    }

    #[test]
    fn sla_budgets_match_policy() {
        assert_eq!(Priority::Critical.sla(), Duration::hours(1));
        assert_eq!(Priority::High.sla(), Duration::hours(4));
        assert_eq!(Priority::Medium.sla(), Duration::hours(24));
        assert_eq!(Priority::Low.sla(), Duration::hours(72));
    }

    #[test]
    fn enum_text_round_trips_through_storage_form() {
        assert_eq!("CRITICAL".parse::<Priority>().unwrap(), Priority::Critical);
        assert_eq!("RED".parse::<ErrorStatus>().unwrap(), ErrorStatus::Red);
        assert_eq!(
            "PENDING".parse::<EscalationStatus>().unwrap(),
            EscalationStatus::Pending
        );
        assert!("URGENT".parse::<Priority>().is_err());
    }

    #[test]
    fn pattern_key_is_stable_and_distinct() {
        let base = ErrorPattern {
            message: "timeout".to_string(),
            agent_id: "specialist-1".to_string(),
            occurrences: 2,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            error_ids: vec![],
        };
        let mut other_agent = base.clone();
        other_agent.agent_id = "specialist-2".to_string();

        assert_eq!(base.key(), base.clone().key());
        assert_ne!(base.key(), other_agent.key());
    }
}
