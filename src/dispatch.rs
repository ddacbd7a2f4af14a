//! The dispatcher: one input line in, one outcome out.
//!
//! Order of checks is load-bearing: asleep gating runs before anything else
//! so a sleeping assistant has no side effects, then the confirmation gate
//! resolves (a pending destructive action consumes or colors this input),
//! then the routed intent reaches its handler.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Local, Utc};
use tracing::{debug, info};

use crate::collaborators::Backends;
use crate::confirm::{ConfirmationGate, DestructiveAction, GateResolution};
use crate::intent::{route, Intent, RouteContext, WipeScope};
use crate::reminders::store::ReminderStore;
use crate::reminders::summary::daily_summary;
use crate::reminders::Reminder;
use crate::session::{Interaction, Session, ASLEEP_REJECTION};
use crate::timeparse::ParseError;

pub const DEFAULT_LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct CoreSettings {
    /// How long a destructive confirmation stays valid.
    pub confirmation_window: StdDuration,
    /// Tolerance for explicit reminder times that just passed.
    pub grace: Duration,
    /// How many reminders a listing reads out before summarizing the rest.
    pub list_limit: usize,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            confirmation_window: StdDuration::from_secs(30),
            grace: Duration::seconds(60),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// What the caller should do with the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    /// Input rejected while asleep; callers may surface or drop it.
    Ignored(&'static str),
    /// Farewell reply; the caller should stop its loop after delivering it.
    Shutdown(String),
}

pub struct Core {
    session: Session,
    gate: ConfirmationGate,
    store: Arc<Mutex<ReminderStore>>,
    backends: Backends,
    settings: CoreSettings,
}

impl Core {
    pub fn new(
        store: Arc<Mutex<ReminderStore>>,
        backends: Backends,
        interaction: Interaction,
        settings: CoreSettings,
    ) -> Self {
        Self {
            session: Session::new(interaction),
            gate: ConfirmationGate::new(settings.confirmation_window),
            store,
            backends,
            settings,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handle_input(&mut self, raw: &str) -> Outcome {
        self.handle_input_at(raw, Local::now(), Instant::now())
    }

    /// Same as [`Core::handle_input`] with the clocks injected, so replies
    /// are a pure function of input and time.
    pub fn handle_input_at(&mut self, raw: &str, now: DateTime<Local>, mono: Instant) -> Outcome {
        let ctx = RouteContext {
            now,
            grace: self.settings.grace,
        };
        let intent = route(raw, &ctx);
        debug!(?intent, "routed input");

        if !self.session.admits(&intent) {
            return Outcome::Ignored(ASLEEP_REJECTION);
        }

        let mut preamble = String::new();
        match self.gate.resolve(raw, mono) {
            GateResolution::Idle => {}
            GateResolution::Confirmed(action) => {
                info!(?action, "destructive action confirmed");
                return Outcome::Reply(self.execute_destructive(action));
            }
            GateResolution::Declined(action) => {
                return Outcome::Reply(format!(
                    "Cancelled — I won't go ahead with {}.",
                    action.describe()
                ));
            }
            GateResolution::Expired(action) => {
                let notice = format!(
                    "The confirmation for {} expired, so nothing was removed.",
                    action.describe()
                );
                // An affirmative that arrived late routes to Unknown; there
                // is nothing further to do with it.
                if matches!(intent, Intent::Unknown { .. }) {
                    return Outcome::Reply(notice);
                }
                preamble = format!("{notice} ");
            }
            GateResolution::Superseded(action) => {
                preamble = format!("Okay, I dropped the request for {}. ", action.describe());
            }
        }

        let reply = match intent {
            Intent::WipeReminders { scope } => {
                self.gate
                    .arm(DestructiveAction::WipeReminders(scope), mono);
                format!(
                    "This will remove {}. Say yes to confirm or no to cancel.",
                    scope.describe()
                )
            }
            Intent::TotalReset => {
                self.gate.arm(DestructiveAction::TotalReset, mono);
                "This will wipe every reminder, the archive, and my memory. \
                 Say yes to confirm or no to cancel."
                    .to_string()
            }
            Intent::WakeUp => {
                if self.session.wake() {
                    "Good to be back. What do you need?".to_string()
                } else {
                    "Already awake.".to_string()
                }
            }
            Intent::Sleep => {
                self.session.sleep();
                "Going quiet. Say 'wake up' when you need me.".to_string()
            }
            Intent::Shutdown => {
                return Outcome::Shutdown(format!("{preamble}Powering down. Goodbye."));
            }
            Intent::SwitchMode { target } => {
                let channel = self.session.switch_interaction(target);
                format!("Switched to {channel} mode.")
            }
            Intent::AddReminder { draft } => self.handle_add(draft, now),
            Intent::ListReminders => self.handle_list(),
            Intent::DeleteReminder { keyword } => self.handle_delete(&keyword, now),
            Intent::DailySummary => {
                let store = self.lock_store();
                daily_summary(&store.list(), store.archive(), now).render()
            }
            Intent::ResetMemory => match self.backends.maintenance.reset_memory() {
                Ok(()) => "Conversation memory cleared.".to_string(),
                Err(err) => format!("Couldn't reset memory: {err}."),
            },
            Intent::CleanCache => match self.backends.maintenance.clean_cache() {
                Ok(()) => "Cache cleaned out.".to_string(),
                Err(err) => format!("Couldn't clean the cache: {err}."),
            },
            Intent::WeatherQuery { city } => {
                if city.is_empty() {
                    "Which city do you want the weather for?".to_string()
                } else {
                    match self.backends.weather.current(&city) {
                        Ok(report) => report,
                        Err(err) => format!("No weather report: {err}."),
                    }
                }
            }
            Intent::WebSearch { query } => {
                if query.is_empty() {
                    "What should I search for?".to_string()
                } else {
                    match self.backends.search.search(&query) {
                        Ok(result) => result,
                        Err(err) => format!("No search results: {err}."),
                    }
                }
            }
            Intent::Unknown { text } => match self.backends.reasoning.respond(&text) {
                Ok(reply) => reply,
                Err(err) => format!("I can't chat right now: {err}."),
            },
        };
        Outcome::Reply(format!("{preamble}{reply}"))
    }

    fn execute_destructive(&mut self, action: DestructiveAction) -> String {
        match action {
            DestructiveAction::WipeReminders(scope) => {
                let report = self.lock_store().wipe(scope);
                match scope {
                    WipeScope::Active => format!(
                        "Done. {} active reminder(s) removed; the archive is untouched.",
                        report.removed_active
                    ),
                    WipeScope::Archive => format!(
                        "Done. {} archived record(s) removed.",
                        report.removed_archive
                    ),
                    WipeScope::All => format!(
                        "Done. {} active and {} archived reminder(s) removed.",
                        report.removed_active, report.removed_archive
                    ),
                }
            }
            DestructiveAction::TotalReset => {
                let report = self.lock_store().wipe(WipeScope::All);
                let mut notes = Vec::new();
                if let Err(err) = self.backends.maintenance.reset_memory() {
                    notes.push(format!("memory reset failed: {err}"));
                }
                if let Err(err) = self.backends.maintenance.clean_cache() {
                    notes.push(format!("cache clean failed: {err}"));
                }
                let mut reply = format!(
                    "Full reset done. {} reminder(s) and {} archived record(s) removed.",
                    report.removed_active, report.removed_archive
                );
                if !notes.is_empty() {
                    reply.push_str(&format!(" ({})", notes.join("; ")));
                }
                reply
            }
        }
    }

    fn handle_add(&mut self, draft: Result<crate::timeparse::ReminderDraft, ParseError>, now: DateTime<Local>) -> String {
        let draft = match draft {
            Ok(draft) => draft,
            Err(ParseError::NoTimeExpression) => {
                return "I need a time for that. Try 'in 20 minutes' or 'at 6pm'.".to_string()
            }
            Err(ParseError::PastTimestamp) => {
                return "That time has already passed. Give me a future time.".to_string()
            }
            Err(ParseError::EmptyTask) => {
                return "Got the time, but what should I remind you about?".to_string()
            }
        };
        match self
            .lock_store()
            .add(draft.task, draft.trigger_at, now.with_timezone(&Utc))
        {
            Ok(reminder) => format!(
                "Reminder {} set for {}: {}.",
                reminder.id,
                format_trigger(&reminder),
                reminder.task
            ),
            Err(err) => format!("Can't add that: {err}."),
        }
    }

    fn handle_list(&mut self) -> String {
        let items = self.lock_store().list();
        if items.is_empty() {
            return "No reminders on the books.".to_string();
        }
        let shown = items.len().min(self.settings.list_limit);
        let mut lines = vec![format!("You have {} reminder(s):", items.len())];
        for reminder in &items[..shown] {
            lines.push(format!(
                "  {} [{}] {} — {}",
                reminder.id,
                reminder.state,
                format_trigger(reminder),
                reminder.task
            ));
        }
        if items.len() > shown {
            lines.push(format!("  ...and {} more.", items.len() - shown));
        }
        lines.join("\n")
    }

    fn handle_delete(&mut self, keyword: &str, now: DateTime<Local>) -> String {
        if keyword.trim().is_empty() {
            return "Which reminder? Give me a word from its task.".to_string();
        }
        match self
            .lock_store()
            .delete_matching(keyword, now.with_timezone(&Utc))
        {
            None => format!("No active reminder mentions '{keyword}'."),
            Some(report) if report.other_matches == 0 => {
                format!("Deleted: {}.", report.removed.task)
            }
            Some(report) => format!(
                "Deleted the soonest match: {}. {} other reminder(s) also mention '{keyword}'.",
                report.removed.task, report.other_matches
            ),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, ReminderStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn format_trigger(reminder: &Reminder) -> String {
    reminder
        .trigger_at
        .with_timezone(&Local)
        .format("%a %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        CollaboratorError, Maintenance, ReasoningBackend, SearchProvider, WeatherProvider,
    };
    use crate::reminders::store::StoreLimits;
    use chrono::TimeZone;

    struct StubReasoning;
    impl ReasoningBackend for StubReasoning {
        fn respond(&mut self, prompt: &str) -> Result<String, CollaboratorError> {
            Ok(format!("echo: {prompt}"))
        }
    }

    struct StubWeather;
    impl WeatherProvider for StubWeather {
        fn current(&mut self, city: &str) -> Result<String, CollaboratorError> {
            Ok(format!("Clear skies over {city}."))
        }
    }

    struct StubSearch;
    impl SearchProvider for StubSearch {
        fn search(&mut self, query: &str) -> Result<String, CollaboratorError> {
            Ok(format!("Top hit for '{query}'."))
        }
    }

    struct CountingMaintenance {
        resets: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }
    impl Maintenance for CountingMaintenance {
        fn reset_memory(&mut self) -> Result<(), CollaboratorError> {
            self.resets
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
        fn clean_cache(&mut self) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    struct Fixture {
        core: Core,
        store: Arc<Mutex<ReminderStore>>,
        resets: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        now: DateTime<Local>,
        mono: Instant,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let mut dir = std::env::temp_dir();
            dir.push(format!("hearth-dispatch-{name}-{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).expect("create temp dir");
            let store = Arc::new(Mutex::new(
                ReminderStore::open(dir.join("reminders.json"), StoreLimits::default())
                    .expect("open store"),
            ));
            let resets = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
            let backends = Backends {
                reasoning: Box::new(StubReasoning),
                weather: Box::new(StubWeather),
                search: Box::new(StubSearch),
                maintenance: Box::new(CountingMaintenance {
                    resets: std::sync::Arc::clone(&resets),
                }),
            };
            let core = Core::new(
                Arc::clone(&store),
                backends,
                Interaction::Voice,
                CoreSettings::default(),
            );
            Self {
                core,
                store,
                resets,
                now: Local
                    .with_ymd_and_hms(2026, 8, 31, 12, 0, 0)
                    .earliest()
                    .expect("test timestamp"),
                mono: Instant::now(),
            }
        }

        fn say(&mut self, input: &str) -> Outcome {
            self.core.handle_input_at(input, self.now, self.mono)
        }

        fn say_after(&mut self, input: &str, secs: u64) -> Outcome {
            self.core
                .handle_input_at(input, self.now, self.mono + StdDuration::from_secs(secs))
        }

        fn reply(&mut self, input: &str) -> String {
            match self.say(input) {
                Outcome::Reply(text) => text,
                other => panic!("expected a reply, got {other:?}"),
            }
        }

        fn active_count(&self) -> usize {
            self.store
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .list()
                .len()
        }
    }

    #[test]
    fn add_then_list_then_delete() {
        let mut fx = Fixture::new("add-list-delete");
        let reply = fx.reply("remind me to buy milk in 30 minutes");
        assert!(reply.contains("buy milk"), "reply was: {reply}");
        assert!(reply.contains("rem_0001"));

        let reply = fx.reply("list reminders");
        assert!(reply.contains("1 reminder"));
        assert!(reply.contains("buy milk"));

        let reply = fx.reply("cancel reminder milk");
        assert!(reply.contains("Deleted"));
        assert_eq!(fx.active_count(), 0);
        assert!(fx.reply("list reminders").contains("No reminders"));
    }

    #[test]
    fn unparseable_time_is_reported_not_defaulted() {
        let mut fx = Fixture::new("no-time");
        let reply = fx.reply("remind me to buy milk eventually");
        assert!(reply.contains("I need a time"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 0);
    }

    #[test]
    fn wipe_requires_confirmation_before_touching_anything() {
        let mut fx = Fixture::new("wipe-confirm");
        fx.reply("remind me to stretch in 10 minutes");

        let reply = fx.reply("wipe reminders");
        assert!(reply.contains("Say yes to confirm"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 1, "nothing removed before confirmation");

        let reply = match fx.say_after("yes", 5) {
            Outcome::Reply(text) => text,
            other => panic!("expected a reply, got {other:?}"),
        };
        assert!(reply.contains("Done"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 0);
    }

    #[test]
    fn declined_wipe_leaves_reminders_alone() {
        let mut fx = Fixture::new("wipe-decline");
        fx.reply("remind me to stretch in 10 minutes");
        fx.reply("wipe reminders");
        let reply = match fx.say_after("no", 5) {
            Outcome::Reply(text) => text,
            other => panic!("expected a reply, got {other:?}"),
        };
        assert!(reply.contains("Cancelled"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 1);
    }

    #[test]
    fn late_confirmation_is_expired_not_executed() {
        let mut fx = Fixture::new("wipe-expired");
        fx.reply("remind me to stretch in 10 minutes");
        fx.reply("wipe reminders");
        let reply = match fx.say_after("yes", 31) {
            Outcome::Reply(text) => text,
            other => panic!("expected a reply, got {other:?}"),
        };
        assert!(reply.contains("expired"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 1);
    }

    #[test]
    fn unrelated_intent_cancels_pending_wipe_and_still_runs() {
        let mut fx = Fixture::new("wipe-superseded");
        fx.reply("remind me to stretch in 10 minutes");
        fx.reply("wipe reminders");
        let reply = match fx.say_after("list reminders", 5) {
            Outcome::Reply(text) => text,
            other => panic!("expected a reply, got {other:?}"),
        };
        assert!(reply.contains("dropped the request"), "reply was: {reply}");
        assert!(reply.contains("stretch"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 1);
    }

    #[test]
    fn asleep_session_ignores_everything_but_wake_and_shutdown() {
        let mut fx = Fixture::new("asleep");
        fx.reply("go to sleep");
        assert_eq!(
            fx.say("remind me to stretch in 10 minutes"),
            Outcome::Ignored(ASLEEP_REJECTION)
        );
        assert_eq!(fx.active_count(), 0);
        assert_eq!(fx.say("list reminders"), Outcome::Ignored(ASLEEP_REJECTION));

        let reply = fx.reply("wake up");
        assert!(reply.contains("back"), "reply was: {reply}");
        assert!(fx.reply("remind me to stretch in 10 minutes").contains("stretch"));
    }

    #[test]
    fn shutdown_works_even_while_asleep() {
        let mut fx = Fixture::new("asleep-shutdown");
        fx.reply("go to sleep");
        assert!(matches!(fx.say("shut down"), Outcome::Shutdown(_)));
    }

    #[test]
    fn reminder_phrasing_beats_sleep_phrasing() {
        let mut fx = Fixture::new("priority");
        let reply = fx.reply("remind me to go to sleep in 5 minutes");
        assert!(reply.contains("go to sleep"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 1);
        // The session itself never slept.
        assert!(fx.reply("list reminders").contains("go to sleep"));
    }

    #[test]
    fn switch_mode_toggles_and_targets() {
        let mut fx = Fixture::new("switch");
        assert!(fx.reply("switch to chat").contains("Chat"));
        assert!(fx.reply("switch mode").contains("Voice"));
    }

    #[test]
    fn total_reset_confirms_then_clears_store_and_memory() {
        let mut fx = Fixture::new("total-reset");
        fx.reply("remind me to stretch in 10 minutes");
        let reply = fx.reply("total reset");
        assert!(reply.contains("confirm"), "reply was: {reply}");
        let reply = match fx.say_after("yes", 2) {
            Outcome::Reply(text) => text,
            other => panic!("expected a reply, got {other:?}"),
        };
        assert!(reply.contains("Full reset done"), "reply was: {reply}");
        assert_eq!(fx.active_count(), 0);
        assert_eq!(fx.resets.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_input_goes_to_the_reasoning_backend() {
        let mut fx = Fixture::new("unknown");
        assert_eq!(fx.reply("tell me a story"), "echo: tell me a story");
    }

    #[test]
    fn weather_and_search_delegate_with_parameters() {
        let mut fx = Fixture::new("delegates");
        assert_eq!(fx.reply("weather in berlin"), "Clear skies over berlin.");
        assert_eq!(
            fx.reply("search for rust iterators"),
            "Top hit for 'rust iterators'."
        );
    }

    #[test]
    fn daily_summary_reflects_store_contents() {
        let mut fx = Fixture::new("summary");
        assert!(fx.reply("daily summary").contains("clean slate"));
        fx.reply("remind me to stretch in 10 minutes");
        assert!(fx.reply("how did i do today").contains("still pending"));
    }
}
