//! Seams to the services the core delegates to but does not implement.
//!
//! The dispatcher is pure decision logic; weather, web search, freeform
//! conversation, and maintenance chores are behind these traits so tests can
//! stub them and the binary can ship offline placeholders.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The backend is not configured or not reachable right now.
    #[error("{0} is unavailable")]
    Unavailable(&'static str),
    #[error("{service} failed: {reason}")]
    Failed {
        service: &'static str,
        reason: String,
    },
}

/// Freeform conversation, for inputs that map to no command.
pub trait ReasoningBackend: Send {
    fn respond(&mut self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Delivery of replies and reminder announcements to the user. A voice build
/// routes this to a synthesizer; the shipped binary prints to the console.
pub trait SpeechOutput: Send {
    fn speak(&mut self, text: &str) -> Result<(), CollaboratorError>;
}

pub struct ConsoleVoice;

impl SpeechOutput for ConsoleVoice {
    fn speak(&mut self, text: &str) -> Result<(), CollaboratorError> {
        println!("{text}");
        Ok(())
    }
}

pub trait WeatherProvider: Send {
    fn current(&mut self, city: &str) -> Result<String, CollaboratorError>;
}

pub trait SearchProvider: Send {
    fn search(&mut self, query: &str) -> Result<String, CollaboratorError>;
}

/// Housekeeping hooks: conversation memory, response cache, factory reset.
pub trait Maintenance: Send {
    fn reset_memory(&mut self) -> Result<(), CollaboratorError>;
    fn clean_cache(&mut self) -> Result<(), CollaboratorError>;
}

pub struct Backends {
    pub reasoning: Box<dyn ReasoningBackend>,
    pub weather: Box<dyn WeatherProvider>,
    pub search: Box<dyn SearchProvider>,
    pub maintenance: Box<dyn Maintenance>,
}

impl Backends {
    /// Everything offline. Reminder and session handling work fully; the
    /// delegating intents reply that their service is unavailable.
    pub fn offline() -> Self {
        Self {
            reasoning: Box::new(Offline("conversation")),
            weather: Box::new(Offline("the weather service")),
            search: Box::new(Offline("web search")),
            maintenance: Box::new(NoopMaintenance),
        }
    }
}

struct Offline(&'static str);

impl ReasoningBackend for Offline {
    fn respond(&mut self, _prompt: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl WeatherProvider for Offline {
    fn current(&mut self, _city: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl SearchProvider for Offline {
    fn search(&mut self, _query: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

/// Maintenance that succeeds without doing anything. There is nothing to
/// reset when no reasoning backend keeps history.
pub struct NoopMaintenance;

impl Maintenance for NoopMaintenance {
    fn reset_memory(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn clean_cache(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
