//! # Escalation Engine
//!
//! Background engine that watches the centralized agent error log for
//! recurring failure patterns and escalates them for mandatory human
//! review. Any error pattern appearing twice or more inside the
//! detection window reaches a human; every automated intervention is
//! recorded to the training log for later audit.
//!
//! One cycle = detect + escalate, overdue sweep, health check,
//! retention sweep; cycles run strictly in sequence on a fixed
//! interval.

pub mod config;
pub mod detector;
pub mod engine;
pub mod escalation;
pub mod health;
pub mod notify;
pub mod priority;
pub mod retention;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use engine::{CycleError, CycleReport, EscalationEngine};
pub use notify::{ChannelConfig, NotificationDispatcher};
pub use storage::{ErrorStore, InMemoryStore, PgStore, StoreError};
pub use types::{ErrorEvent, ErrorPattern, EscalationRecord, Priority};
