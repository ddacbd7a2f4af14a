//! Daily summary aggregation over the reminder store.

use chrono::{DateTime, TimeZone};

use super::{Reminder, ReminderState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySummary {
    pub completed_today: Vec<String>,
    pub missed_today: Vec<String>,
    /// Still on the books: pending plus triggered-but-unacknowledged.
    pub pending: usize,
}

impl DailySummary {
    pub fn is_quiet(&self) -> bool {
        self.completed_today.is_empty() && self.missed_today.is_empty() && self.pending == 0
    }

    /// One spoken-style paragraph, the shape a voice reply wants.
    pub fn render(&self) -> String {
        if self.is_quiet() {
            return "Nothing on the books today. A clean slate.".to_string();
        }
        let mut parts = Vec::new();
        match self.completed_today.len() {
            0 => {}
            1 => parts.push(format!("You completed 1 task: {}.", self.completed_today[0])),
            n => parts.push(format!(
                "You completed {n} tasks: {}.",
                self.completed_today.join(", ")
            )),
        }
        match self.missed_today.len() {
            0 => {}
            1 => parts.push(format!("You missed 1 reminder: {}.", self.missed_today[0])),
            n => parts.push(format!(
                "You missed {n} reminders: {}.",
                self.missed_today.join(", ")
            )),
        }
        match self.pending {
            0 => {}
            1 => parts.push("1 reminder is still pending.".to_string()),
            n => parts.push(format!("{n} reminders are still pending.")),
        }
        parts.join(" ")
    }
}

/// Aggregate today's activity. "Today" is the calendar day of `now` in the
/// caller's timezone; resolution timestamps are converted before comparing,
/// so a reminder completed at 23:50 local stays in today's summary even
/// though its UTC stamp is tomorrow.
pub fn daily_summary<Tz: TimeZone>(
    active: &[Reminder],
    archive: &[Reminder],
    now: DateTime<Tz>,
) -> DailySummary {
    let today = now.date_naive();
    let mut summary = DailySummary::default();

    for reminder in archive {
        let Some(resolved_at) = reminder.resolved_at else {
            continue;
        };
        if resolved_at.with_timezone(&now.timezone()).date_naive() != today {
            continue;
        }
        if reminder.state == ReminderState::Completed {
            summary.completed_today.push(reminder.task.clone());
        }
    }

    for reminder in active {
        match reminder.state {
            // Only items due today belong in today's summary; next week's
            // reminders are not "still pending" for this day.
            ReminderState::Pending | ReminderState::Triggered => {
                if reminder.trigger_at.with_timezone(&now.timezone()).date_naive() == today {
                    summary.pending += 1;
                }
            }
            ReminderState::Missed => {
                let missed_today = reminder
                    .resolved_at
                    .is_some_and(|t| t.with_timezone(&now.timezone()).date_naive() == today);
                if missed_today {
                    summary.missed_today.push(reminder.task.clone());
                }
            }
            _ => {}
        }
    }

    summary
}
