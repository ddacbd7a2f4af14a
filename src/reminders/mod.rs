//! Reminder records and their lifecycle.
//!
//! A reminder moves through `Pending -> Triggered -> Completed` in the happy
//! path, with `Missed` for triggers the poller catches late and `Deleted` for
//! user removals. `Completed`, `Missed` (once acknowledged), and `Deleted`
//! records are terminal: they live in the archive and never re-enter the
//! active set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod persist;
pub mod store;
pub mod summary;

/// Monotonic id, rendered as `rem_0001`. Never reused, even across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub u64);

impl std::fmt::Display for ReminderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rem_{:04}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    /// Waiting for its trigger time.
    Pending,
    /// Trigger time reached; announced, awaiting acknowledgement.
    Triggered,
    /// Trigger time passed by more than the missed threshold before the
    /// poller saw it (e.g. the process was down).
    Missed,
    Completed,
    Deleted,
}

impl ReminderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReminderState::Completed | ReminderState::Deleted
        )
    }

    /// States that occupy a slot against the active capacity limit.
    pub fn counts_against_capacity(self) -> bool {
        matches!(self, ReminderState::Pending | ReminderState::Triggered)
    }
}

impl std::fmt::Display for ReminderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReminderState::Pending => "pending",
            ReminderState::Triggered => "triggered",
            ReminderState::Missed => "missed",
            ReminderState::Completed => "completed",
            ReminderState::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub task: String,
    pub trigger_at: DateTime<Utc>,
    pub state: ReminderState,
    pub created_at: DateTime<Utc>,
    /// When the poller first announced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    /// Set when the reminder stops waiting: detection time for Missed,
    /// final resolution time otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Reminder {
    pub fn new(id: ReminderId, task: String, trigger_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            task,
            trigger_at,
            state: ReminderState::Pending,
            created_at: now,
            triggered_at: None,
            resolved_at: None,
        }
    }
}

/// Everything that can happen to an active reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Poller found the trigger time reached within the missed threshold.
    Trigger,
    /// Poller found the trigger time overdue past the missed threshold.
    MarkMissed,
    /// User acknowledged a triggered or missed reminder.
    Acknowledge,
    /// User removed the reminder before (or after) it fired.
    Delete,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("reminder {id} cannot {event:?} from state {state}")]
pub struct InvalidTransition {
    pub id: ReminderId,
    pub state: ReminderState,
    pub event: LifecycleEvent,
}

/// Pure transition function. The store applies it and handles persistence;
/// keeping it free of I/O makes the state machine directly testable.
pub fn apply(reminder: &mut Reminder, event: LifecycleEvent, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
    use LifecycleEvent::*;
    use ReminderState::*;

    let next = match (reminder.state, event) {
        (Pending, Trigger) => Triggered,
        // A triggered reminder that sits unacknowledged past the threshold
        // goes missed too; it must never linger as silently active.
        (Pending | Triggered, MarkMissed) => Missed,
        (Triggered | Missed, Acknowledge) => Completed,
        (Pending | Triggered | Missed, Delete) => Deleted,
        (state, event) => {
            return Err(InvalidTransition {
                id: reminder.id,
                state,
                event,
            })
        }
    };
    reminder.state = next;
    if next == Triggered {
        reminder.triggered_at = Some(now);
    }
    if next.is_terminal() || next == Missed {
        // Missed reminders stay visible in the active set until acknowledged,
        // but their resolution time is when they were detected, not when the
        // user finally saw them.
        if reminder.resolved_at.is_none() || next.is_terminal() {
            reminder.resolved_at = Some(now);
        }
    }
    Ok(())
}
