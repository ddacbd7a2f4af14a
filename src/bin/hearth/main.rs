//! Interactive assistant loop over stdin/stdout.
//!
//! A reader thread feeds input lines into a channel so the main loop can
//! select between user input and poller alerts. Announced reminders are
//! acknowledged on the spot: delivering them is the delivery.

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::Parser;
use crossbeam_channel::{bounded, never, select, Receiver};
use tracing::{info, warn};

use hearth::collaborators::{Backends, ConsoleVoice, SpeechOutput};
use hearth::config::{self, AppConfig};
use hearth::telemetry;
use hearth::{Core, CoreSettings, Outcome, PollerRuntime, Reminder, ReminderAlert, ReminderStore};

const INPUT_CHANNEL_CAPACITY: usize = 8;

fn main() -> anyhow::Result<()> {
    let mut cli = AppConfig::parse();
    let user = config::load_user_config();
    config::apply_user_config(&mut cli, &user);
    let config = cli.clamped();
    telemetry::init_tracing(&config);

    let snapshot_path = config.snapshot_path();
    let store = ReminderStore::open(snapshot_path.clone(), config.store_limits())
        .with_context(|| format!("loading reminder snapshot from {}", snapshot_path.display()))?;
    let store = Arc::new(Mutex::new(store));

    let poller = PollerRuntime::spawn(Arc::clone(&store), config.poll_interval());
    let mut alerts: Receiver<ReminderAlert> = poller.alerts().clone();

    let mut core = Core::new(
        Arc::clone(&store),
        Backends::offline(),
        config.interaction(),
        CoreSettings {
            confirmation_window: config.confirmation_window(),
            grace: config.grace(),
            list_limit: config.list_limit,
        },
    );
    let mut voice = ConsoleVoice;

    let lines = spawn_stdin_reader()?;
    info!(snapshot = %snapshot_path.display(), "hearth started");
    deliver(&mut voice, "hearth ready. Say 'shut down' to exit.");

    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match core.handle_input(&line) {
                    Outcome::Reply(text) => deliver(&mut voice, &text),
                    Outcome::Ignored(text) => deliver(&mut voice, text),
                    Outcome::Shutdown(text) => {
                        deliver(&mut voice, &text);
                        break;
                    }
                }
            }
            recv(alerts) -> alert => {
                match alert {
                    Ok(alert) => announce(&mut voice, &store, alert),
                    // Poller gone; stop selecting on a dead channel.
                    Err(_) => alerts = never(),
                }
            }
        }
    }

    poller.shutdown();
    Ok(())
}

fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = bounded(INPUT_CHANNEL_CAPACITY);
    thread::Builder::new()
        .name("hearth-stdin".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader thread")?;
    Ok(rx)
}

fn deliver(voice: &mut dyn SpeechOutput, text: &str) {
    if let Err(err) = voice.speak(text) {
        warn!(error = %err, "failed to deliver reply");
    }
}

fn announce(voice: &mut dyn SpeechOutput, store: &Arc<Mutex<ReminderStore>>, alert: ReminderAlert) {
    match alert {
        ReminderAlert::Due(reminder) => {
            deliver(
                voice,
                &format!("Reminder: {} (set for {}).", reminder.task, local_time(&reminder)),
            );
            acknowledge(store, &reminder);
        }
        ReminderAlert::MissedBatch(batch) => {
            let mut lines = vec![format!(
                "While I was away, {} reminder(s) came and went:",
                batch.len()
            )];
            for reminder in &batch {
                lines.push(format!(
                    "  - {} (was due {})",
                    reminder.task,
                    local_time(reminder)
                ));
                acknowledge(store, reminder);
            }
            deliver(voice, &lines.join("\n"));
        }
    }
}

fn acknowledge(store: &Arc<Mutex<ReminderStore>>, reminder: &Reminder) {
    let mut guard = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.acknowledge(reminder.id, Utc::now());
}

fn local_time(reminder: &Reminder) -> String {
    reminder
        .trigger_at
        .with_timezone(&Local)
        .format("%a %H:%M")
        .to_string()
}
