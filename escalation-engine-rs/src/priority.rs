// escalation-engine-rs/src/priority.rs
//
// Priority Engine: the sole policy surface mapping an error pattern's
// occurrence count and originating tier to an escalation priority.

use crate::types::Priority;

/// Classify a pattern into a priority level.
///
/// Base priority comes from the originating tier, matched as a
/// case-insensitive substring of the agent id; volume overrides it:
/// 10+ occurrences are always CRITICAL, 5+ always HIGH, and 3+ bumps a
/// non-LOW base to HIGH. Deterministic and side-effect free.
pub fn classify(occurrences: usize, agent_id: &str) -> Priority {
    let id = agent_id.to_lowercase();
    let base = if id.contains("orchestrator") {
        Priority::High
    } else if id.contains("manager") {
        Priority::Medium
    } else {
        Priority::Low
    };

    if occurrences >= 10 {
        Priority::Critical
    } else if occurrences >= 5 {
        Priority::High
    } else if occurrences >= 3 && base != Priority::Low {
        Priority::High
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_sets_base_priority_at_low_volume() {
        assert_eq!(classify(1, "orchestrator-1"), Priority::High);
        assert_eq!(classify(2, "orchestrator-1"), Priority::High);
        assert_eq!(classify(1, "manager-1"), Priority::Medium);
        assert_eq!(classify(2, "manager-1"), Priority::Medium);
        assert_eq!(classify(1, "specialist-1"), Priority::Low);
        assert_eq!(classify(2, "specialist-1"), Priority::Low);
    }

    #[test]
    fn three_occurrences_bump_non_low_bases_only() {
        assert_eq!(classify(3, "manager-1"), Priority::High);
        assert_eq!(classify(4, "manager-1"), Priority::High);
        assert_eq!(classify(3, "orchestrator-1"), Priority::High);
        assert_eq!(classify(3, "specialist-1"), Priority::Low);
        assert_eq!(classify(4, "specialist-1"), Priority::Low);
    }

    #[test]
    fn five_occurrences_force_high_regardless_of_tier() {
        assert_eq!(classify(5, "specialist-1"), Priority::High);
        assert_eq!(classify(9, "specialist-1"), Priority::High);
        assert_eq!(classify(5, "manager-1"), Priority::High);
        assert_eq!(classify(9, "orchestrator-1"), Priority::High);
    }

    #[test]
    fn ten_occurrences_force_critical_regardless_of_tier() {
        assert_eq!(classify(10, "orchestrator-1"), Priority::Critical);
        assert_eq!(classify(10, "manager-1"), Priority::Critical);
        assert_eq!(classify(10, "specialist-1"), Priority::Critical);
        assert_eq!(classify(50, "specialist-1"), Priority::Critical);
    }

    #[test]
    fn tier_match_is_case_insensitive_substring() {
        assert_eq!(classify(1, "Prod-Orchestrator-7"), Priority::High);
        assert_eq!(classify(1, "BUILD-MANAGER"), Priority::Medium);
        assert_eq!(classify(1, "worker-42"), Priority::Low);
    }
}
