//! Session state machine: assistant mode and interaction channel.
//!
//! One session exists per process, created awake at startup and never
//! persisted. While asleep every intent except wake-up (and shutdown) is
//! rejected before it can reach a handler, so a sleeping assistant has no
//! side effects.

use crate::intent::Intent;

/// Reply text for inputs rejected while the session is asleep.
pub const ASLEEP_REJECTION: &str = "ignored — asleep";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Awake,
    Asleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Voice,
    Chat,
}

impl std::fmt::Display for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Interaction::Voice => "Voice",
            Interaction::Chat => "Chat",
        };
        write!(f, "{label}")
    }
}

impl Interaction {
    #[must_use = "the toggled channel should replace the current one"]
    pub fn toggled(self) -> Self {
        match self {
            Interaction::Voice => Interaction::Chat,
            Interaction::Chat => Interaction::Voice,
        }
    }
}

/// Process-wide session state. Owns nothing but the mode pair; confirmation
/// state lives in [`crate::confirm::ConfirmationGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    mode: Mode,
    interaction: Interaction,
}

impl Session {
    #[must_use = "a session must be retained to gate intents"]
    pub fn new(interaction: Interaction) -> Self {
        Self {
            mode: Mode::Awake,
            interaction,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    /// Whether this intent may proceed to a handler in the current mode.
    /// Wake-up and shutdown are admitted in any state; everything else
    /// requires the session to be awake.
    #[must_use = "gating result decides whether the intent reaches a handler"]
    pub fn admits(&self, intent: &Intent) -> bool {
        match self.mode {
            Mode::Awake => true,
            Mode::Asleep => matches!(intent, Intent::WakeUp | Intent::Shutdown),
        }
    }

    /// Transition to awake. Returns false when already awake (no-op).
    pub fn wake(&mut self) -> bool {
        if self.mode == Mode::Awake {
            return false;
        }
        self.mode = Mode::Awake;
        true
    }

    /// Transition to asleep. Returns false when already asleep.
    pub fn sleep(&mut self) -> bool {
        if self.mode == Mode::Asleep {
            return false;
        }
        self.mode = Mode::Asleep;
        true
    }

    /// Switch the interaction channel. With an explicit target the channel is
    /// set to it; without one it toggles. Returns the channel now in effect.
    pub fn switch_interaction(&mut self, target: Option<Interaction>) -> Interaction {
        self.interaction = target.unwrap_or_else(|| self.interaction.toggled());
        self.interaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_awake() {
        let session = Session::new(Interaction::Voice);
        assert_eq!(session.mode(), Mode::Awake);
        assert_eq!(session.interaction(), Interaction::Voice);
    }

    #[test]
    fn asleep_session_admits_only_wake_and_shutdown() {
        let mut session = Session::new(Interaction::Voice);
        assert!(session.sleep());

        assert!(session.admits(&Intent::WakeUp));
        assert!(session.admits(&Intent::Shutdown));
        assert!(!session.admits(&Intent::ListReminders));
        assert!(!session.admits(&Intent::DailySummary));
        assert!(!session.admits(&Intent::SwitchMode { target: None }));
    }

    #[test]
    fn awake_session_admits_everything() {
        let session = Session::new(Interaction::Chat);
        assert!(session.admits(&Intent::ListReminders));
        assert!(session.admits(&Intent::Sleep));
        assert!(session.admits(&Intent::Unknown {
            text: "hello".to_string()
        }));
    }

    #[test]
    fn wake_and_sleep_report_whether_mode_changed() {
        let mut session = Session::new(Interaction::Voice);
        assert!(!session.wake());
        assert!(session.sleep());
        assert!(!session.sleep());
        assert!(session.wake());
    }

    #[test]
    fn switch_interaction_toggles_without_target() {
        let mut session = Session::new(Interaction::Voice);
        assert_eq!(session.switch_interaction(None), Interaction::Chat);
        assert_eq!(session.switch_interaction(None), Interaction::Voice);
    }

    #[test]
    fn switch_interaction_honors_explicit_target() {
        let mut session = Session::new(Interaction::Voice);
        assert_eq!(
            session.switch_interaction(Some(Interaction::Voice)),
            Interaction::Voice
        );
        assert_eq!(
            session.switch_interaction(Some(Interaction::Chat)),
            Interaction::Chat
        );
    }

    #[test]
    fn switching_interaction_leaves_mode_untouched() {
        let mut session = Session::new(Interaction::Voice);
        session.sleep();
        session.switch_interaction(Some(Interaction::Chat));
        assert_eq!(session.mode(), Mode::Asleep);
    }
}
