//! Dialogue session
//!
//! A single actor task owns the state machine, the activation flag, the
//! transcript source, the timers and the history. Session controls,
//! transcript events and timer expirations are all handled one at a time
//! by that task, in arrival order.
//!
//! ```text
//!   SessionHandle ──┐
//!   TranscriptSource ─┼──► Session::run ──► StateMachine / Synthesizer / History
//!   Timers ─────────┘
//! ```

mod actor;
mod handle;
mod timers;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::state::DialogueState;

pub use actor::Session;
pub use handle::SessionHandle;

/// Session errors surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("speech recognition is not available in this environment")]
    UnsupportedEnvironment,

    #[error("transcript source has closed")]
    SourceClosed,

    #[error("failed to spawn transcript reader thread: {0}")]
    ThreadSpawn(String),

    #[error("session is not running")]
    ActorGone,
}

/// Phrasing and timing of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub wake_phrase: String,
    pub acknowledgement: String,
    pub locale: String,
    /// Accepting a command -> speaking the reply
    pub thinking_delay: Duration,
    /// Speaking -> listening again
    pub speaking_delay: Duration,
    /// Accepting a farewell -> deactivation
    pub deactivation_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            wake_phrase: "сатела".to_string(),
            acknowledgement: "Слушаю вас".to_string(),
            locale: "ru-RU".to_string(),
            thinking_delay: Duration::from_millis(1000),
            speaking_delay: Duration::from_millis(2000),
            deactivation_delay: Duration::from_millis(2000),
        }
    }
}

impl SessionSettings {
    /// Reject settings the session cannot honor
    ///
    /// A farewell must be spoken before the session stops, so deactivation
    /// has to come strictly after the reply.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wake_phrase.trim().is_empty() {
            return Err(ConfigError::EmptyWakePhrase);
        }
        if self.deactivation_delay <= self.thinking_delay {
            return Err(ConfigError::DeactivationTooEarly {
                deactivation_ms: self.deactivation_delay.as_millis() as u64,
                thinking_ms: self.thinking_delay.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Snapshot of the session for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Daemon version
    pub version: String,

    /// Microphone on, transcript source subscribed
    pub session_open: bool,

    /// Wake phrase heard
    pub active: bool,

    pub state: DialogueState,

    /// Latest recognized text, cleared once a reply is recorded
    pub current_text: String,

    pub history_len: usize,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            session_open: false,
            active: false,
            state: DialogueState::Idle,
            current_text: String::new(),
            history_len: 0,
            uptime_secs: 0,
        }
    }
}
