//! Decision core for a local voice/text assistant.
//!
//! Turns a free-form utterance into a safely-gated action and manages the
//! lifecycle of user-created reminders, including missed-trigger recovery
//! after downtime and bounded-retention archiving. Speech, LLM, weather, and
//! search engines are external collaborators behind narrow traits and hold no
//! state in this crate.

pub mod collaborators;
pub mod config;
pub mod confirm;
pub mod dispatch;
pub mod intent;
pub mod reminders;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod timeparse;

pub use dispatch::{Core, CoreSettings, Outcome};
pub use intent::{Intent, WipeScope};
pub use reminders::store::ReminderStore;
pub use reminders::{Reminder, ReminderId, ReminderState};
pub use scheduler::{PollerRuntime, ReminderAlert};
pub use session::{Interaction, Mode, Session};
