//! The reminder store: active set, archive, and the operations the
//! dispatcher and poller drive them with.
//!
//! Every mutation persists the snapshot before returning. A failed write is
//! logged and the in-memory state kept authoritative; the next successful
//! mutation writes everything back out.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use super::persist::{self, PersistenceError, Snapshot};
use super::{apply, LifecycleEvent, Reminder, ReminderId, ReminderState};
use crate::intent::WipeScope;

pub const DEFAULT_MAX_ACTIVE: usize = 20;
pub const DEFAULT_RETENTION: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Cap on reminders counting against capacity (pending + triggered).
    pub max_active: usize,
    /// Cap on archived records; oldest-resolved are evicted past this.
    pub retention: usize,
    /// How far past its trigger time a pending reminder may be found before
    /// it counts as missed rather than due.
    pub missed_threshold: Duration,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_active: DEFAULT_MAX_ACTIVE,
            retention: DEFAULT_RETENTION,
            missed_threshold: Duration::seconds(120),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("reminder limit reached ({limit} active); complete or delete one first")]
pub struct CapacityError {
    pub limit: usize,
}

/// What a poll pass found. `due` fired on time; `missed` were overdue past
/// the threshold (typically because the process was down) and are reported
/// as one batch rather than one announcement each.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub due: Vec<Reminder>,
    pub missed: Vec<Reminder>,
}

impl PollOutcome {
    pub fn is_empty(&self) -> bool {
        self.due.is_empty() && self.missed.is_empty()
    }
}

/// Result of a keyword delete: what went, and how many other active
/// reminders also matched the keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub removed: Reminder,
    pub other_matches: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WipeReport {
    pub removed_active: usize,
    pub removed_archive: usize,
}

#[derive(Debug)]
pub struct ReminderStore {
    path: PathBuf,
    limits: StoreLimits,
    next_id: u64,
    active: Vec<Reminder>,
    archive: Vec<Reminder>,
}

impl ReminderStore {
    /// Open the store backed by the snapshot at `path`. A missing file is an
    /// empty store; a corrupt one is fatal so the caller can surface it
    /// instead of silently starting over.
    pub fn open(path: PathBuf, limits: StoreLimits) -> Result<Self, PersistenceError> {
        let snapshot = persist::load(&path)?;
        debug!(
            path = %path.display(),
            active = snapshot.active.len(),
            archive = snapshot.archive.len(),
            "reminder store loaded"
        );
        Ok(Self {
            path,
            limits,
            next_id: snapshot.next_id,
            active: snapshot.active,
            archive: snapshot.archive,
        })
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Active reminders sorted by trigger time. Includes missed reminders
    /// that have not been acknowledged yet.
    pub fn list(&self) -> Vec<Reminder> {
        let mut items = self.active.clone();
        items.sort_by_key(|r| (r.trigger_at, r.id));
        items
    }

    pub fn archive(&self) -> &[Reminder] {
        &self.archive
    }

    fn capacity_used(&self) -> usize {
        self.active
            .iter()
            .filter(|r| r.state.counts_against_capacity())
            .count()
    }

    pub fn add(
        &mut self,
        task: String,
        trigger_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reminder, CapacityError> {
        if self.capacity_used() >= self.limits.max_active {
            return Err(CapacityError {
                limit: self.limits.max_active,
            });
        }
        let id = ReminderId(self.next_id);
        self.next_id += 1;
        let reminder = Reminder::new(id, task, trigger_at, now);
        self.active.push(reminder.clone());
        self.persist();
        Ok(reminder)
    }

    /// Delete the active reminder whose task contains `keyword`
    /// (case-insensitive). The earliest trigger time wins when several
    /// match; the count of remaining matches is reported so the caller can
    /// surface the ambiguity. The deleted record goes to the archive.
    pub fn delete_matching(&mut self, keyword: &str, now: DateTime<Utc>) -> Option<DeleteReport> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let mut matches: Vec<usize> = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, r)| r.task.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();
        matches.sort_by_key(|&i| (self.active[i].trigger_at, self.active[i].id));
        let &chosen = matches.first()?;
        let mut reminder = self.active.remove(chosen);
        if apply(&mut reminder, LifecycleEvent::Delete, now).is_err() {
            self.active.insert(chosen, reminder);
            return None;
        }
        self.archive_record(reminder.clone());
        self.persist();
        Some(DeleteReport {
            removed: reminder,
            other_matches: matches.len() - 1,
        })
    }

    /// Acknowledge a triggered or missed reminder, completing and archiving
    /// it. Unknown or already-resolved ids return `None`.
    pub fn acknowledge(&mut self, id: ReminderId, now: DateTime<Utc>) -> Option<Reminder> {
        let index = self.active.iter().position(|r| r.id == id)?;
        let mut reminder = self.active[index].clone();
        if apply(&mut reminder, LifecycleEvent::Acknowledge, now).is_err() {
            return None;
        }
        self.active.remove(index);
        self.archive_record(reminder.clone());
        self.persist();
        Some(reminder)
    }

    /// Bulk wipe. Active items are discarded outright, not archived; the
    /// confirmation gate has already stood between the user and this call.
    pub fn wipe(&mut self, scope: WipeScope) -> WipeReport {
        let mut report = WipeReport::default();
        if matches!(scope, WipeScope::Active | WipeScope::All) {
            report.removed_active = self.active.len();
            self.active.clear();
        }
        if matches!(scope, WipeScope::Archive | WipeScope::All) {
            report.removed_archive = self.archive.len();
            self.archive.clear();
        }
        self.persist();
        report
    }

    /// Sweep the active set for reminders whose trigger time has arrived.
    /// Each reminder transitions exactly once, so a batch of missed items is
    /// reported on the first poll that sees them and never again.
    pub fn poll(&mut self, now: DateTime<Utc>) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        for reminder in &mut self.active {
            if reminder.trigger_at > now {
                continue;
            }
            let overdue = now - reminder.trigger_at;
            let stale = overdue > self.limits.missed_threshold;
            let event = match reminder.state {
                ReminderState::Pending if stale => LifecycleEvent::MarkMissed,
                ReminderState::Pending => LifecycleEvent::Trigger,
                // Announced but never acknowledged; past the threshold it
                // counts as missed rather than staying quietly active.
                ReminderState::Triggered if stale => LifecycleEvent::MarkMissed,
                _ => continue,
            };
            if apply(reminder, event, now).is_ok() {
                match event {
                    LifecycleEvent::Trigger => outcome.due.push(reminder.clone()),
                    _ => outcome.missed.push(reminder.clone()),
                }
            }
        }
        if !outcome.is_empty() {
            self.persist();
        }
        outcome
    }

    fn archive_record(&mut self, reminder: Reminder) {
        self.archive.push(reminder);
        // Retention: evict oldest-resolved first, ties broken by creation
        // time. Records without a resolution stamp (legacy hand-edits) sort
        // oldest of all.
        while self.archive.len() > self.limits.retention {
            let oldest = self
                .archive
                .iter()
                .enumerate()
                .min_by_key(|(_, r)| (r.resolved_at, r.created_at))
                .map(|(i, _)| i);
            match oldest {
                Some(index) => {
                    let evicted = self.archive.remove(index);
                    debug!(id = %evicted.id, "evicted archived reminder past retention");
                }
                None => break,
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: persist::SNAPSHOT_VERSION,
            next_id: self.next_id,
            active: self.active.clone(),
            archive: self.archive.clone(),
        }
    }

    fn persist(&self) {
        if let Err(err) = persist::save(&self.path, &self.snapshot()) {
            warn!(error = %err, "failed to persist reminder snapshot; state kept in memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn utc(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .expect("test timestamp")
            .and_utc()
    }

    fn temp_store(name: &str, limits: StoreLimits) -> ReminderStore {
        let mut dir = std::env::temp_dir();
        dir.push(format!("hearth-store-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");
        ReminderStore::open(dir.join("reminders.json"), limits).expect("open store")
    }

    const NOON: &str = "2026-08-31 12:00";

    #[test]
    fn add_assigns_sequential_ids_and_sorted_listing() {
        let mut store = temp_store("add", StoreLimits::default());
        let later = store
            .add("second".into(), utc("2026-08-31 16:00"), utc(NOON))
            .unwrap();
        let sooner = store
            .add("first".into(), utc("2026-08-31 13:00"), utc(NOON))
            .unwrap();
        assert_eq!(later.id, ReminderId(1));
        assert_eq!(sooner.id, ReminderId(2));
        let listed = store.list();
        assert_eq!(listed[0].task, "first");
        assert_eq!(listed[1].task, "second");
    }

    #[test]
    fn capacity_counts_only_pending_and_triggered() {
        let limits = StoreLimits {
            max_active: 2,
            ..StoreLimits::default()
        };
        let mut store = temp_store("capacity", limits);
        store.add("a".into(), utc("2026-08-31 13:00"), utc(NOON)).unwrap();
        store.add("b".into(), utc("2026-08-31 14:00"), utc(NOON)).unwrap();
        assert_eq!(
            store.add("c".into(), utc("2026-08-31 15:00"), utc(NOON)),
            Err(CapacityError { limit: 2 })
        );
        // A missed reminder frees a slot even before acknowledgement.
        let outcome = store.poll(utc("2026-08-31 13:10"));
        assert_eq!(outcome.missed.len(), 1);
        assert!(store
            .add("c".into(), utc("2026-08-31 15:00"), utc(NOON))
            .is_ok());
    }

    #[test]
    fn poll_splits_due_from_missed_by_threshold() {
        let mut store = temp_store("poll", StoreLimits::default());
        store
            .add("on time".into(), utc("2026-08-31 12:59"), utc(NOON))
            .unwrap();
        store
            .add("long overdue".into(), utc("2026-08-31 12:10"), utc(NOON))
            .unwrap();
        let outcome = store.poll(utc("2026-08-31 13:00"));
        assert_eq!(outcome.due.len(), 1);
        assert_eq!(outcome.due[0].task, "on time");
        assert_eq!(outcome.missed.len(), 1);
        assert_eq!(outcome.missed[0].task, "long overdue");
    }

    #[test]
    fn poll_reports_each_reminder_exactly_once() {
        let mut store = temp_store("poll-once", StoreLimits::default());
        store
            .add("ping".into(), utc("2026-08-31 12:30"), utc(NOON))
            .unwrap();
        let first = store.poll(utc("2026-08-31 12:30"));
        assert_eq!(first.due.len(), 1);
        let second = store.poll(utc("2026-08-31 12:31"));
        assert!(second.is_empty());
    }

    #[test]
    fn missed_reminders_stay_listed_until_acknowledged() {
        let mut store = temp_store("missed-listed", StoreLimits::default());
        let r = store
            .add("vanished".into(), utc("2026-08-31 12:05"), utc(NOON))
            .unwrap();
        store.poll(utc("2026-08-31 13:00"));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].state, ReminderState::Missed);
        let done = store.acknowledge(r.id, utc("2026-08-31 13:05")).unwrap();
        assert_eq!(done.state, ReminderState::Completed);
        assert!(store.list().is_empty());
        assert_eq!(store.archive().len(), 1);
    }

    #[test]
    fn delete_matches_case_insensitive_substring() {
        let mut store = temp_store("delete", StoreLimits::default());
        store
            .add("Call the Dentist".into(), utc("2026-08-31 13:00"), utc(NOON))
            .unwrap();
        store
            .add("water plants".into(), utc("2026-08-31 14:00"), utc(NOON))
            .unwrap();
        let report = store.delete_matching("dentist", utc(NOON)).unwrap();
        assert_eq!(report.removed.state, ReminderState::Deleted);
        assert_eq!(report.other_matches, 0);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.archive().len(), 1);
        assert!(store.delete_matching("dentist", utc(NOON)).is_none());
        assert!(store.delete_matching("  ", utc(NOON)).is_none());
    }

    #[test]
    fn delete_picks_earliest_trigger_and_reports_ambiguity() {
        let mut store = temp_store("delete-ambiguous", StoreLimits::default());
        store
            .add("water the ferns".into(), utc("2026-08-31 15:00"), utc(NOON))
            .unwrap();
        store
            .add("water the cactus".into(), utc("2026-08-31 13:00"), utc(NOON))
            .unwrap();
        let report = store.delete_matching("water", utc(NOON)).unwrap();
        assert_eq!(report.removed.task, "water the cactus");
        assert_eq!(report.other_matches, 1);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn stale_triggered_reminder_becomes_missed_on_a_later_poll() {
        let mut store = temp_store("stale-triggered", StoreLimits::default());
        store
            .add("ignored ping".into(), utc("2026-08-31 12:30"), utc(NOON))
            .unwrap();
        let first = store.poll(utc("2026-08-31 12:30"));
        assert_eq!(first.due.len(), 1);
        let second = store.poll(utc("2026-08-31 12:33"));
        assert_eq!(second.missed.len(), 1);
        assert_eq!(second.missed[0].state, ReminderState::Missed);
    }

    #[test]
    fn wipe_active_leaves_archive_untouched() {
        let mut store = temp_store("wipe", StoreLimits::default());
        let r = store
            .add("done".into(), utc("2026-08-31 12:05"), utc(NOON))
            .unwrap();
        store.poll(utc("2026-08-31 12:05"));
        store.acknowledge(r.id, utc("2026-08-31 12:06"));
        store
            .add("live".into(), utc("2026-08-31 14:00"), utc(NOON))
            .unwrap();

        let report = store.wipe(WipeScope::Active);
        assert_eq!(report.removed_active, 1);
        assert_eq!(report.removed_archive, 0);
        assert!(store.list().is_empty());
        assert_eq!(store.archive().len(), 1);

        let report = store.wipe(WipeScope::All);
        assert_eq!(report.removed_archive, 1);
        assert!(store.archive().is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_wipe() {
        let mut store = temp_store("wipe-ids", StoreLimits::default());
        store
            .add("a".into(), utc("2026-08-31 13:00"), utc(NOON))
            .unwrap();
        store.wipe(WipeScope::All);
        let next = store
            .add("b".into(), utc("2026-08-31 13:00"), utc(NOON))
            .unwrap();
        assert_eq!(next.id, ReminderId(2));
    }

    #[test]
    fn retention_evicts_oldest_resolved_first() {
        let limits = StoreLimits {
            retention: 2,
            ..StoreLimits::default()
        };
        let mut store = temp_store("retention", limits);
        for (task, minute) in [("one", 1), ("two", 2), ("three", 3)] {
            let r = store
                .add(task.into(), utc("2026-08-31 12:05"), utc(NOON))
                .unwrap();
            store.poll(utc("2026-08-31 12:05"));
            store.acknowledge(r.id, utc(&format!("2026-08-31 13:0{minute}")));
        }
        let tasks: Vec<_> = store.archive().iter().map(|r| r.task.as_str()).collect();
        assert_eq!(tasks, vec!["two", "three"]);
    }

    #[test]
    fn retention_ties_on_resolved_at_evict_oldest_created() {
        let limits = StoreLimits {
            retention: 1,
            ..StoreLimits::default()
        };
        let mut store = temp_store("retention-ties", limits);
        // Younger record enters the archive first.
        store
            .add("young".into(), utc("2026-08-31 14:00"), utc("2026-08-31 12:05"))
            .unwrap();
        store
            .add("old".into(), utc("2026-08-31 14:00"), utc(NOON))
            .unwrap();
        let wiped_at = utc("2026-08-31 12:10");
        store.delete_matching("young", wiped_at).unwrap();
        store.delete_matching("old", wiped_at).unwrap();

        let tasks: Vec<_> = store.archive().iter().map(|r| r.task.as_str()).collect();
        assert_eq!(tasks, vec!["young"]);
    }

    #[test]
    fn archive_never_exceeds_retention_under_churn() {
        let limits = StoreLimits {
            retention: 3,
            ..StoreLimits::default()
        };
        let mut store = temp_store("churn", limits);
        for round in 0..10u32 {
            let r = store
                .add(format!("task {round}"), utc("2026-08-31 12:05"), utc(NOON))
                .unwrap();
            store.poll(utc("2026-08-31 12:05"));
            if round % 3 == 0 {
                let _ = store.delete_matching(&format!("task {round}"), utc("2026-08-31 12:06"));
            } else {
                store.acknowledge(r.id, utc("2026-08-31 12:06"));
            }
            assert!(store.archive().len() <= limits.retention);
        }
        assert_eq!(store.archive().len(), 3);
    }

    #[test]
    fn state_survives_reopen() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("hearth-store-reopen-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("reminders.json");

        let mut store = ReminderStore::open(path.clone(), StoreLimits::default()).unwrap();
        store
            .add("persist me".into(), utc("2026-08-31 15:00"), utc(NOON))
            .unwrap();
        drop(store);

        let reopened = ReminderStore::open(path, StoreLimits::default()).unwrap();
        assert_eq!(reopened.list().len(), 1);
        assert_eq!(reopened.list()[0].task, "persist me");
    }
}
