//! Natural-language time expression parser for reminder creation.
//!
//! Converts a phrase like "to buy milk in 20 minutes" into an absolute
//! trigger timestamp plus the task text with the time phrase removed. The
//! parser is deterministic and never consults the reasoning backend, so
//! reminder creation works with every heavyweight collaborator offline.
//!
//! Recognized forms:
//!   - relative: "in 20 minutes", "in 2 hours"
//!   - absolute: "at 18:00", "at 6pm" (nearest future occurrence)
//!   - dated:    "tomorrow at 5pm", "today at 9:30"
//!
//! Anything else is a hard [`ParseError`]; there is no fallback default time.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no recognizable time expression")]
    NoTimeExpression,
    #[error("that time is already in the past")]
    PastTimestamp,
    #[error("the reminder has no task text")]
    EmptyTask,
}

/// Parsed reminder request: what to do and when to trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    pub task: String,
    pub trigger_at: DateTime<Utc>,
}

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bin\s+(\d{1,3})\s*(minute|min|hour|hr)s?\b")
            .expect("relative time pattern compiles")
    })
}

fn at_clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b")
            .expect("clock time pattern compiles")
    })
}

fn bare_meridiem_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").expect("meridiem pattern compiles")
    })
}

/// Parse a reminder phrase against `now`. `grace` is the tolerance for
/// explicit times that just passed ("today at 9:00" spoken at 9:00:30).
pub fn parse_reminder(
    input: &str,
    now: DateTime<Local>,
    grace: Duration,
) -> Result<ReminderDraft, ParseError> {
    let normalized = normalize(input);

    let (trigger_at, consumed) = if let Some(caps) = relative_re().captures(&normalized) {
        let span = caps.get(0).map(|m| m.as_str().to_string());
        (parse_relative(&caps, now)?, span.into_iter().collect())
    } else if normalized.contains("tomorrow") {
        let (at, mut spans) = parse_dated(&normalized, now, DatedDay::Tomorrow)?;
        spans.push("tomorrow".to_string());
        (at, spans)
    } else if normalized.contains("today") || normalized.contains("tonight") {
        let (at, mut spans) = parse_dated(&normalized, now, DatedDay::Today)?;
        spans.push("today".to_string());
        spans.push("tonight".to_string());
        (at, spans)
    } else if let Some(caps) = at_clock_re().captures(&normalized) {
        let span = caps.get(0).map(|m| m.as_str().to_string());
        let (hour, minute) = clock_fields(&caps)?;
        let target = nearest_future(now, hour, minute)?;
        (target, span.into_iter().collect())
    } else {
        return Err(ParseError::NoTimeExpression);
    };

    if trigger_at < now - grace {
        return Err(ParseError::PastTimestamp);
    }

    let task = extract_task(&normalized, &consumed)?;
    Ok(ReminderDraft {
        task,
        trigger_at: trigger_at.with_timezone(&Utc),
    })
}

enum DatedDay {
    Today,
    Tomorrow,
}

fn parse_relative(
    caps: &regex::Captures<'_>,
    now: DateTime<Local>,
) -> Result<DateTime<Local>, ParseError> {
    let amount: i64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or(ParseError::NoTimeExpression)?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let offset = match unit {
        "hour" | "hr" => Duration::hours(amount),
        _ => Duration::minutes(amount),
    };
    Ok(now + offset)
}

/// Resolve "tomorrow ..." / "today ..." with a clock time found anywhere in
/// the phrase. A day word without any clock time is not a usable expression.
fn parse_dated(
    text: &str,
    now: DateTime<Local>,
    day: DatedDay,
) -> Result<(DateTime<Local>, Vec<String>), ParseError> {
    let caps = at_clock_re()
        .captures(text)
        .or_else(|| bare_meridiem_re().captures(text))
        .ok_or(ParseError::NoTimeExpression)?;
    let span = caps.get(0).map(|m| m.as_str().to_string());
    let (hour, minute) = clock_fields(&caps)?;
    let date = match day {
        DatedDay::Today => now.date_naive(),
        DatedDay::Tomorrow => now
            .date_naive()
            .succ_opt()
            .ok_or(ParseError::NoTimeExpression)?,
    };
    let target = local_datetime(date, hour, minute).ok_or(ParseError::NoTimeExpression)?;
    Ok((target, span.into_iter().collect()))
}

/// Extract clock fields from a capture, applying 12-hour fixups.
fn clock_fields(caps: &regex::Captures<'_>) -> Result<(u32, u32), ParseError> {
    let mut hour: u32 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or(ParseError::NoTimeExpression)?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| ParseError::NoTimeExpression)?,
        None => 0,
    };
    let meridiem = caps.get(3).map(|m| m.as_str());

    match meridiem {
        Some(_) if !(1..=12).contains(&hour) => return Err(ParseError::NoTimeExpression),
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    if hour > 23 || minute > 59 {
        return Err(ParseError::NoTimeExpression);
    }
    Ok((hour, minute))
}

/// "at 18:00" with no date resolves to the nearest future occurrence.
fn nearest_future(now: DateTime<Local>, hour: u32, minute: u32) -> Result<DateTime<Local>, ParseError> {
    let today = local_datetime(now.date_naive(), hour, minute).ok_or(ParseError::NoTimeExpression)?;
    if today > now {
        return Ok(today);
    }
    let tomorrow = now
        .date_naive()
        .succ_opt()
        .and_then(|d| local_datetime(d, hour, minute))
        .ok_or(ParseError::NoTimeExpression)?;
    Ok(tomorrow)
}

fn local_datetime(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Local>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    // DST gaps have no local representation; take the earliest valid reading
    // for ambiguous times.
    Local.from_local_datetime(&naive).earliest()
}

/// Strip the consumed time spans out of the phrase and tidy what remains.
fn extract_task(text: &str, consumed: &[String]) -> Result<String, ParseError> {
    let mut task = text.to_string();
    for span in consumed {
        if span.is_empty() {
            continue;
        }
        if let Some(pos) = task.find(span.as_str()) {
            task.replace_range(pos..pos + span.len(), " ");
        }
    }
    let mut task = normalize(&task);
    for filler in ["to", "that"] {
        if task == *filler {
            task.clear();
            break;
        }
        if let Some(rest) = task.strip_prefix(&format!("{filler} ")) {
            task = rest.to_string();
            break;
        }
    }
    let task = task
        .trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .to_string();
    if task.is_empty() {
        return Err(ParseError::EmptyTask);
    }
    Ok(task)
}

fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}
