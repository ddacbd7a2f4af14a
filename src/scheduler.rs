//! Background poller that sweeps the reminder store for due triggers.
//!
//! The poller owns a thread that shares the store behind a mutex with the
//! dispatcher, polls on a fixed interval, and pushes alerts over a bounded
//! channel. The first sweep runs immediately at spawn, which is what recovers
//! reminders that came due while the process was down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::reminders::store::ReminderStore;
use crate::reminders::Reminder;

pub const ALERT_CHANNEL_CAPACITY: usize = 32;
/// Stop-flag check granularity while sleeping between sweeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderAlert {
    /// A reminder fired on time; announce it on its own.
    Due(Reminder),
    /// Reminders found overdue past the missed threshold, reported as one
    /// batch so a long outage does not produce a barrage of announcements.
    MissedBatch(Vec<Reminder>),
}

#[must_use = "dropping the runtime without shutdown leaves the poller thread running"]
pub struct PollerRuntime {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    alerts: Receiver<ReminderAlert>,
}

impl PollerRuntime {
    pub fn spawn(store: Arc<Mutex<ReminderStore>>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(ALERT_CHANNEL_CAPACITY);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("hearth-poller".into())
            .spawn(move || poller_loop(&store, &tx, &thread_stop, interval))
            .ok();
        if handle.is_none() {
            warn!("failed to spawn poller thread; reminders will not fire");
        }
        Self {
            stop,
            handle,
            alerts: rx,
        }
    }

    pub fn alerts(&self) -> &Receiver<ReminderAlert> {
        &self.alerts
    }

    /// Signal the thread to stop and wait briefly for it to exit. A thread
    /// stuck past the timeout is abandoned rather than blocking shutdown.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("poller thread did not stop within {JOIN_TIMEOUT:?}; detaching");
            }
        }
    }
}

fn poller_loop(
    store: &Mutex<ReminderStore>,
    tx: &Sender<ReminderAlert>,
    stop: &AtomicBool,
    interval: Duration,
) {
    debug!(interval_secs = interval.as_secs(), "poller thread started");
    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let outcome = {
            let mut guard = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.poll(Utc::now())
        };
        if !outcome.missed.is_empty() {
            send_alert(tx, ReminderAlert::MissedBatch(outcome.missed));
        }
        for reminder in outcome.due {
            send_alert(tx, ReminderAlert::Due(reminder));
        }
        if !sleep_until_stopped(stop, interval) {
            break;
        }
    }
    debug!("poller thread exiting");
}

fn send_alert(tx: &Sender<ReminderAlert>, alert: ReminderAlert) {
    match tx.try_send(alert) {
        Ok(()) => {}
        Err(TrySendError::Full(alert)) => {
            // The consumer is far behind; drop rather than block the sweep.
            // The reminder itself is already Triggered/Missed in the store,
            // so nothing is lost from the records.
            warn!(?alert, "alert channel full; dropping announcement");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Sleep for `interval` in small slices, returning false the moment the stop
/// flag is raised.
fn sleep_until_stopped(stop: &AtomicBool, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    while Instant::now() < deadline {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        thread::sleep(SLEEP_SLICE.min(deadline.saturating_duration_since(Instant::now())));
    }
    !stop.load(Ordering::Acquire)
}
