//! Events module for dialogue session transitions
//!
//! Provides structured event types for session lifecycle, activation,
//! state changes, transcript display updates and recorded commands.

use serde::{Deserialize, Serialize};

use crate::history::Command;
use crate::state::DialogueState;
use crate::transcript::RecognitionErrorCode;

/// Why the assistant went back to passive monitoring or the session closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationReason {
    /// A deactivation command was spoken and its farewell delay elapsed
    Farewell,
    /// The session was stopped through the session controls
    UserStop,
    /// Recognition reported a no-speech timeout while listening
    NoSpeech,
    /// The transcript source ended and could not be resubscribed
    SourceClosed,
    /// The daemon is shutting down
    Shutdown,
}

impl std::fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeactivationReason::Farewell => write!(f, "farewell"),
            DeactivationReason::UserStop => write!(f, "user_stop"),
            DeactivationReason::NoSpeech => write!(f, "no_speech"),
            DeactivationReason::SourceClosed => write!(f, "source_closed"),
            DeactivationReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Events emitted by the session during transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Microphone turned on, transcript source subscribed
    SessionStarted,

    /// Microphone turned off, timers and subscription released
    SessionStopped {
        reason: DeactivationReason,
    },

    /// Wake phrase heard, commands are now accepted
    Activated,

    /// Activation flag cleared
    Deactivated {
        reason: DeactivationReason,
    },

    /// Dialogue state changed
    StateChanged {
        from: DialogueState,
        to: DialogueState,
        /// Time spent in the previous state
        duration_ms: u64,
    },

    /// Recognized text changed (interim or final), for display only
    TranscriptUpdated {
        text: String,
        is_final: bool,
    },

    /// An exchange was spoken and appended to the history
    CommandRecorded {
        command: Command,
    },

    /// The transcript source reported a recognition failure
    RecognitionError {
        code: RecognitionErrorCode,
    },
}

impl std::fmt::Display for StateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateEvent::SessionStarted => write!(f, "SESSION_STARTED"),
            StateEvent::SessionStopped { reason } => write!(f, "SESSION_STOPPED ({})", reason),
            StateEvent::Activated => write!(f, "ACTIVATED"),
            StateEvent::Deactivated { reason } => write!(f, "DEACTIVATED ({})", reason),
            StateEvent::StateChanged {
                from,
                to,
                duration_ms,
            } => {
                write!(f, "STATE_CHANGED ({} -> {}, {}ms)", from, to, duration_ms)
            }
            StateEvent::TranscriptUpdated { is_final, .. } => {
                if *is_final {
                    write!(f, "TRANSCRIPT_FINAL")
                } else {
                    write!(f, "TRANSCRIPT_INTERIM")
                }
            }
            StateEvent::CommandRecorded { command } => {
                write!(f, "COMMAND_RECORDED (#{} {})", command.id(), command.category())
            }
            StateEvent::RecognitionError { code } => write!(f, "RECOGNITION_ERROR ({})", code),
        }
    }
}
