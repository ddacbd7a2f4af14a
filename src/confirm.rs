//! Two-step confirmation gate for destructive actions.
//!
//! A destructive intent arms the gate instead of executing; the next input
//! resolves it. Expiry is checked lazily at the resolution attempt, never by
//! a timer. At most one action is pending; arming again replaces it.

use std::time::{Duration, Instant};

use crate::intent::WipeScope;

/// Words that open a refusal. Checked against the first token, so
/// "no, do not confirm" declines before the word "confirm" is ever seen.
const NEGATIVE_LEADS: &[&str] = &[
    "no", "nope", "don't", "dont", "never", "stop", "abort", "cancel", "negative",
];
/// Words that open an agreement, plus standalone tokens accepted anywhere.
const AFFIRMATIVE_LEADS: &[&str] = &["yes", "yeah", "yep", "sure", "confirm", "affirmative"];
const AFFIRMATIVE_TOKENS: &[&str] = &["confirm", "confirmed", "affirmative"];
const AFFIRMATIVE_PHRASES: &[&str] = &["do it", "go ahead", "proceed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructiveAction {
    WipeReminders(WipeScope),
    TotalReset,
}

impl DestructiveAction {
    /// Noun phrase for replies: "wiping all active reminders", "a total reset".
    pub fn describe(self) -> String {
        match self {
            DestructiveAction::WipeReminders(scope) => format!("wiping {}", scope.describe()),
            DestructiveAction::TotalReset => "a total reset".to_string(),
        }
    }
}

/// How a resolution attempt ended. Every non-`Idle` outcome clears the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateResolution {
    /// Nothing was pending; the input flows through untouched.
    Idle,
    /// Affirmative within the window: execute the action.
    Confirmed(DestructiveAction),
    /// Explicit negative: cancelled, nothing executed.
    Declined(DestructiveAction),
    /// The window elapsed before this attempt: cancelled.
    Expired(DestructiveAction),
    /// An unrelated input arrived first: cancelled, input proceeds normally.
    Superseded(DestructiveAction),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    action: DestructiveAction,
    issued_at: Instant,
}

#[derive(Debug)]
pub struct ConfirmationGate {
    pending: Option<Pending>,
    window: Duration,
}

impl ConfirmationGate {
    #[must_use = "the gate must be retained to guard destructive intents"]
    pub fn new(window: Duration) -> Self {
        Self {
            pending: None,
            window,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm the gate for `action`. Returns the action that was replaced, if a
    /// confirmation was already pending.
    pub fn arm(&mut self, action: DestructiveAction, now: Instant) -> Option<DestructiveAction> {
        self.pending
            .replace(Pending {
                action,
                issued_at: now,
            })
            .map(|p| p.action)
    }

    /// Resolve the pending confirmation against the next input. The input is
    /// matched as raw text (spoken or typed) against the affirmative and
    /// negative phrase tables; anything else counts as an unrelated intent.
    pub fn resolve(&mut self, raw: &str, now: Instant) -> GateResolution {
        let Some(pending) = self.pending.take() else {
            return GateResolution::Idle;
        };
        if now.duration_since(pending.issued_at) > self.window {
            return GateResolution::Expired(pending.action);
        }
        let words = tokenize(raw);
        if is_negative(&words) {
            return GateResolution::Declined(pending.action);
        }
        if is_affirmative(&words) {
            return GateResolution::Confirmed(pending.action);
        }
        GateResolution::Superseded(pending.action)
    }
}

/// Lowercased words with surrounding punctuation stripped, so "No," and
/// "no" compare equal.
fn tokenize(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_ascii_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn is_negative(words: &[String]) -> bool {
    let leads_negative = words
        .first()
        .is_some_and(|w| NEGATIVE_LEADS.contains(&w.as_str()));
    let joined = words.join(" ");
    leads_negative
        || words.iter().any(|w| w == "cancel")
        || joined.contains("never mind")
        || joined.contains("do not")
}

fn is_affirmative(words: &[String]) -> bool {
    let leads_affirmative = words
        .first()
        .is_some_and(|w| AFFIRMATIVE_LEADS.contains(&w.as_str()));
    let joined = words.join(" ");
    leads_affirmative
        || words
            .iter()
            .any(|w| AFFIRMATIVE_TOKENS.contains(&w.as_str()))
        || AFFIRMATIVE_PHRASES.contains(&joined.as_str())
}
