//! Runtime configuration: CLI flags, environment, and the persistent user
//! config file (`~/.config/hearth/config.toml`).
//!
//! Precedence is CLI flag, then environment variable, then the config file,
//! then the built-in default. Out-of-range values are clamped, not rejected;
//! a typo in a tuning knob should never keep the assistant from starting.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tracing::warn;

use crate::dispatch::DEFAULT_LIST_LIMIT;
use crate::reminders::store::{StoreLimits, DEFAULT_MAX_ACTIVE, DEFAULT_RETENTION};
use crate::session::Interaction;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_MISSED_THRESHOLD_SECS: u64 = 120;
pub const MIN_MISSED_THRESHOLD_SECS: u64 = 30;
pub const MAX_MISSED_THRESHOLD_SECS: u64 = 86_400;

pub const DEFAULT_CONFIRMATION_WINDOW_SECS: u64 = 30;
pub const MIN_CONFIRMATION_WINDOW_SECS: u64 = 5;
pub const MAX_CONFIRMATION_WINDOW_SECS: u64 = 300;

pub const MIN_MAX_ACTIVE: usize = 1;
pub const MAX_MAX_ACTIVE: usize = 500;

pub const MIN_RETENTION: usize = 1;
pub const MAX_RETENTION: usize = 1000;

pub const DEFAULT_GRACE_SECS: u64 = 60;
pub const MIN_GRACE_SECS: u64 = 0;
pub const MAX_GRACE_SECS: u64 = 3_600;

const CONFIG_FILE: &str = "config.toml";
const SNAPSHOT_FILE: &str = "reminders.json";
const CONFIG_DIR_ENV: &str = "HEARTH_CONFIG_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Voice,
    Chat,
}

impl From<Channel> for Interaction {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Voice => Interaction::Voice,
            Channel::Chat => Interaction::Chat,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(name = "hearth", about = "Local assistant decision core", version)]
pub struct AppConfig {
    /// Seconds between reminder sweeps
    #[arg(long = "poll-interval-secs", env = "HEARTH_POLL_INTERVAL_SECS",
          default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Seconds past its trigger time before a reminder counts as missed
    #[arg(long = "missed-threshold-secs", env = "HEARTH_MISSED_THRESHOLD_SECS",
          default_value_t = DEFAULT_MISSED_THRESHOLD_SECS)]
    pub missed_threshold_secs: u64,

    /// Seconds a destructive confirmation stays valid
    #[arg(long = "confirmation-window-secs", env = "HEARTH_CONFIRMATION_WINDOW_SECS",
          default_value_t = DEFAULT_CONFIRMATION_WINDOW_SECS)]
    pub confirmation_window_secs: u64,

    /// Maximum pending/triggered reminders at once
    #[arg(long = "max-active", env = "HEARTH_MAX_ACTIVE", default_value_t = DEFAULT_MAX_ACTIVE)]
    pub max_active: usize,

    /// Archived records kept before the oldest are evicted
    #[arg(long = "retention", env = "HEARTH_RETENTION", default_value_t = DEFAULT_RETENTION)]
    pub retention: usize,

    /// Tolerance in seconds for explicit reminder times that just passed
    #[arg(long = "grace-secs", env = "HEARTH_GRACE_SECS", default_value_t = DEFAULT_GRACE_SECS)]
    pub grace_secs: u64,

    /// Reminders read out in a listing before summarizing the rest
    #[arg(long = "list-limit", env = "HEARTH_LIST_LIMIT", default_value_t = DEFAULT_LIST_LIMIT)]
    pub list_limit: usize,

    /// Interaction channel to start in
    #[arg(long = "channel", value_enum, env = "HEARTH_CHANNEL", default_value_t = Channel::Voice)]
    pub channel: Channel,

    /// Reminder snapshot path (default: <config dir>/reminders.json)
    #[arg(long = "data-file", env = "HEARTH_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Diagnostic log path (default: HEARTH_TRACE_LOG, else temp dir)
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Disable the diagnostic log file
    #[arg(long = "no-logs", default_value_t = false)]
    pub no_logs: bool,
}

impl AppConfig {
    /// Clamp every tuning knob into its supported range.
    #[must_use = "clamping returns the adjusted config"]
    pub fn clamped(mut self) -> Self {
        self.poll_interval_secs = self
            .poll_interval_secs
            .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS);
        self.missed_threshold_secs = self
            .missed_threshold_secs
            .clamp(MIN_MISSED_THRESHOLD_SECS, MAX_MISSED_THRESHOLD_SECS);
        self.confirmation_window_secs = self
            .confirmation_window_secs
            .clamp(MIN_CONFIRMATION_WINDOW_SECS, MAX_CONFIRMATION_WINDOW_SECS);
        self.max_active = self.max_active.clamp(MIN_MAX_ACTIVE, MAX_MAX_ACTIVE);
        self.retention = self.retention.clamp(MIN_RETENTION, MAX_RETENTION);
        self.grace_secs = self.grace_secs.clamp(MIN_GRACE_SECS, MAX_GRACE_SECS);
        self.list_limit = self.list_limit.max(1);
        self
    }

    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.poll_interval_secs)
    }

    pub fn confirmation_window(&self) -> StdDuration {
        StdDuration::from_secs(self.confirmation_window_secs)
    }

    pub fn grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_secs as i64)
    }

    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            max_active: self.max_active,
            retention: self.retention,
            missed_threshold: chrono::Duration::seconds(self.missed_threshold_secs as i64),
        }
    }

    pub fn interaction(&self) -> Interaction {
        self.channel.into()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        match &self.data_file {
            Some(path) => path.clone(),
            None => data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(SNAPSHOT_FILE),
        }
    }
}

/// Persistent user preferences. Every field optional; a missing key falls
/// through to the CLI default. Unknown keys are ignored for forward
/// compatibility.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserConfig {
    pub poll_interval_secs: Option<u64>,
    pub missed_threshold_secs: Option<u64>,
    pub confirmation_window_secs: Option<u64>,
    pub max_active: Option<usize>,
    pub retention: Option<usize>,
    pub grace_secs: Option<u64>,
    pub list_limit: Option<usize>,
    pub channel: Option<Channel>,
}

fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::config_dir().map(|dir| dir.join("hearth"))
}

fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::data_dir().map(|dir| dir.join("hearth"))
}

pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Load the persistent user config. A missing file is simply all-default;
/// an unparseable one is logged and ignored rather than blocking startup.
pub fn load_user_config() -> UserConfig {
    let Some(path) = config_file_path() else {
        return UserConfig::default();
    };
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(_) => return UserConfig::default(),
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable user config");
            UserConfig::default()
        }
    }
}

/// Merge persisted preferences into the parsed CLI config. A value from the
/// file applies only when neither the matching flag nor its environment
/// variable was given, so explicit settings always win.
pub fn apply_user_config(cli: &mut AppConfig, user: &UserConfig) {
    let args: Vec<String> = env::args().collect();
    let mut merge_u64 = |flag: &str, env_var: &str, value: Option<u64>, slot: &mut u64| {
        if let Some(value) = value {
            if !explicitly_set(&args, flag, env_var) {
                *slot = value;
            }
        }
    };
    merge_u64(
        "--poll-interval-secs",
        "HEARTH_POLL_INTERVAL_SECS",
        user.poll_interval_secs,
        &mut cli.poll_interval_secs,
    );
    merge_u64(
        "--missed-threshold-secs",
        "HEARTH_MISSED_THRESHOLD_SECS",
        user.missed_threshold_secs,
        &mut cli.missed_threshold_secs,
    );
    merge_u64(
        "--confirmation-window-secs",
        "HEARTH_CONFIRMATION_WINDOW_SECS",
        user.confirmation_window_secs,
        &mut cli.confirmation_window_secs,
    );
    merge_u64(
        "--grace-secs",
        "HEARTH_GRACE_SECS",
        user.grace_secs,
        &mut cli.grace_secs,
    );

    let mut merge_usize = |flag: &str, env_var: &str, value: Option<usize>, slot: &mut usize| {
        if let Some(value) = value {
            if !explicitly_set(&args, flag, env_var) {
                *slot = value;
            }
        }
    };
    merge_usize("--max-active", "HEARTH_MAX_ACTIVE", user.max_active, &mut cli.max_active);
    merge_usize("--retention", "HEARTH_RETENTION", user.retention, &mut cli.retention);
    merge_usize("--list-limit", "HEARTH_LIST_LIMIT", user.list_limit, &mut cli.list_limit);

    if let Some(channel) = user.channel {
        if !explicitly_set(&args, "--channel", "HEARTH_CHANNEL") {
            cli.channel = channel;
        }
    }
}

fn explicitly_set(args: &[String], flag: &str, env_var: &str) -> bool {
    let prefix = format!("{flag}=");
    args.iter().any(|arg| arg == flag || arg.starts_with(&prefix)) || env::var_os(env_var).is_some()
}
