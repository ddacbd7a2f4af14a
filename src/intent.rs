//! Intent router: classifies an input line into one intent with parameters.
//!
//! Classification is a pure function of the input text and a priority-ordered
//! table of phrase families; the first family with a matching phrase wins and
//! no match yields [`Intent::Unknown`]. Reminder families come first so that
//! "remind me to go to sleep in 10 minutes" creates a reminder instead of
//! putting the assistant to sleep. Classification always produces an intent:
//! a failed time parse is carried inside [`Intent::AddReminder`] so execution,
//! not routing, reports the error.

use chrono::{DateTime, Duration, Local};

use crate::session::Interaction;
use crate::timeparse::{parse_reminder, ParseError, ReminderDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeScope {
    Active,
    Archive,
    All,
}

impl WipeScope {
    pub fn describe(self) -> &'static str {
        match self {
            WipeScope::Active => "all active reminders",
            WipeScope::Archive => "the reminder archive",
            WipeScope::All => "all reminders and history",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    WakeUp,
    Sleep,
    SwitchMode { target: Option<Interaction> },
    Shutdown,
    ResetMemory,
    CleanCache,
    TotalReset,
    AddReminder { draft: Result<ReminderDraft, ParseError> },
    ListReminders,
    DeleteReminder { keyword: String },
    WipeReminders { scope: WipeScope },
    DailySummary,
    WeatherQuery { city: String },
    WebSearch { query: String },
    Unknown { text: String },
}

/// Inputs a constructor may need beyond the matched text.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext {
    pub now: DateTime<Local>,
    pub grace: Duration,
}

/// Phrase tables, highest priority first. First family containing a matching
/// phrase wins; within a family the earliest matching phrase provides the
/// remainder used for parameter extraction.
type Constructor = fn(&RouteContext, &str, &str) -> Intent;

const FAMILIES: &[(&[&str], Constructor)] = &[
    (
        &[
            "remind me",
            "schedule task",
            "set alarm",
            "create reminder",
            "log reminder",
        ],
        build_add_reminder,
    ),
    (
        &[
            "cancel reminder",
            "delete reminder",
            "remove reminder",
            "delete task",
            "abort mission",
        ],
        build_delete_reminder,
    ),
    (
        &[
            "wipe all reminders",
            "wipe reminder archive",
            "wipe archive",
            "wipe active reminders",
            "wipe reminders",
        ],
        build_wipe_reminders,
    ),
    (
        &[
            "list reminders",
            "show reminders",
            "reminder status",
            "what's on my agenda",
            "what's on my schedule",
            "mission log",
        ],
        |_, _, _| Intent::ListReminders,
    ),
    (
        &[
            "daily summary",
            "status report",
            "today's summary",
            "how did i do today",
        ],
        |_, _, _| Intent::DailySummary,
    ),
    (
        &["total reset", "factory reset", "reset everything"],
        |_, _, _| Intent::TotalReset,
    ),
    (
        &["reset memory", "forget everything", "clear history"],
        |_, _, _| Intent::ResetMemory,
    ),
    (
        &["clean your system", "clean cache", "clear cache"],
        |_, _, _| Intent::CleanCache,
    ),
    (
        &[
            "weather in",
            "weather for",
            "weather scan",
            "atmospheric conditions",
            "environmental report",
        ],
        build_weather_query,
    ),
    (
        &["search the web for", "search for", "web search", "look up"],
        build_web_search,
    ),
    (&["wake up", "rise and shine"], |_, _, _| Intent::WakeUp),
    (
        &["go to sleep", "temporarily sleep", "pause system", "take a nap"],
        |_, _, _| Intent::Sleep,
    ),
    (
        &["switch to chat", "switch to voice", "switch mode", "chat mode", "voice mode"],
        build_switch_mode,
    ),
    (
        &["shut down", "shutdown", "power down", "power off"],
        |_, _, _| Intent::Shutdown,
    ),
];

/// Classify one input line. Pure; no side effects.
#[must_use = "routing result carries the intent to gate and execute"]
pub fn route(raw: &str, ctx: &RouteContext) -> Intent {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Intent::Unknown {
            text: String::new(),
        };
    }
    for (phrases, build) in FAMILIES {
        if let Some(phrase) = phrases.iter().find(|p| normalized.contains(**p)) {
            return build(ctx, &normalized, phrase);
        }
    }
    Intent::Unknown {
        text: raw.trim().to_string(),
    }
}

fn build_add_reminder(ctx: &RouteContext, normalized: &str, phrase: &str) -> Intent {
    let rest = remainder_after(normalized, phrase);
    Intent::AddReminder {
        draft: parse_reminder(&rest, ctx.now, ctx.grace),
    }
}

fn build_delete_reminder(_: &RouteContext, normalized: &str, phrase: &str) -> Intent {
    Intent::DeleteReminder {
        keyword: remainder_after(normalized, phrase),
    }
}

fn build_wipe_reminders(_: &RouteContext, _: &str, phrase: &str) -> Intent {
    let scope = match phrase {
        "wipe all reminders" => WipeScope::All,
        "wipe reminder archive" | "wipe archive" => WipeScope::Archive,
        _ => WipeScope::Active,
    };
    Intent::WipeReminders { scope }
}

fn build_weather_query(_: &RouteContext, normalized: &str, phrase: &str) -> Intent {
    let mut city = remainder_after(normalized, phrase);
    // "weather scan for berlin" leaves a dangling preposition before the city.
    for connective in ["for ", "in ", "of ", "at "] {
        if let Some(rest) = city.strip_prefix(connective) {
            city = rest.trim().to_string();
            break;
        }
    }
    Intent::WeatherQuery { city }
}

fn build_web_search(_: &RouteContext, normalized: &str, phrase: &str) -> Intent {
    Intent::WebSearch {
        query: remainder_after(normalized, phrase),
    }
}

fn build_switch_mode(_: &RouteContext, normalized: &str, _: &str) -> Intent {
    let target = if normalized.contains("chat") {
        Some(Interaction::Chat)
    } else if normalized.contains("voice") {
        Some(Interaction::Voice)
    } else {
        None
    };
    Intent::SwitchMode { target }
}

fn remainder_after(normalized: &str, phrase: &str) -> String {
    normalized
        .split_once(phrase)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default()
        .to_string()
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}
