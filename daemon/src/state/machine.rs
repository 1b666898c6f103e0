//! Core dialogue state machine implementation
//!
//! Handles transitions between Idle, Listening, Thinking and Speaking and
//! owns the activation flag. Every accepted transition is logged and
//! broadcast as a [`StateEvent`].

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{DeactivationReason, StateEvent};

/// The four dialogue states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    /// Passive: waiting for the wake phrase, or microphone off
    Idle,
    /// Active and ready to accept the next command
    Listening,
    /// A command was accepted and is being classified
    Thinking,
    /// The response is being spoken
    Speaking,
}

impl Default for DialogueState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for DialogueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogueState::Idle => write!(f, "Idle"),
            DialogueState::Listening => write!(f, "Listening"),
            DialogueState::Thinking => write!(f, "Thinking"),
            DialogueState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Rejected transition requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    Invalid {
        from: DialogueState,
        to: DialogueState,
    },

    #[error("assistant is not active")]
    NotActive,

    #[error("assistant is already active")]
    AlreadyActive,
}

/// The state machine that manages the dialogue lifecycle
pub struct StateMachine {
    /// Current state
    state: DialogueState,
    /// Set by the wake phrase, cleared on deactivation
    active: bool,
    /// Time when current non-Idle state was entered
    state_entered_at: Option<Instant>,
    /// Channel for emitting state events
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateMachine {
    /// Create a new state machine in Idle, inactive
    pub fn new(event_tx: broadcast::Sender<StateEvent>) -> Self {
        Self {
            state: DialogueState::Idle,
            active: false,
            state_entered_at: None,
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> DialogueState {
        self.state
    }

    /// Whether the wake phrase has been heard and not yet revoked
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Wake phrase detected: set the flag and start listening
    pub fn activate(&mut self) -> Result<(), TransitionError> {
        if self.active {
            return Err(TransitionError::AlreadyActive);
        }
        self.check(DialogueState::Listening)?;

        self.active = true;
        self.emit(StateEvent::Activated);
        self.transition_to(DialogueState::Listening);
        Ok(())
    }

    /// A finalized utterance was accepted for classification
    pub fn accept_utterance(&mut self) -> Result<(), TransitionError> {
        if !self.active {
            return Err(TransitionError::NotActive);
        }
        self.check(DialogueState::Thinking)?;
        self.transition_to(DialogueState::Thinking);
        Ok(())
    }

    /// Classification finished and synthesis begins
    pub fn begin_speaking(&mut self) -> Result<(), TransitionError> {
        self.check(DialogueState::Speaking)?;
        self.transition_to(DialogueState::Speaking);
        Ok(())
    }

    /// Post-synthesis delay elapsed, ready for the next command
    pub fn resume_listening(&mut self) -> Result<(), TransitionError> {
        if !self.active {
            return Err(TransitionError::NotActive);
        }
        self.check(DialogueState::Listening)?;
        self.transition_to(DialogueState::Listening);
        Ok(())
    }

    /// Force Idle from any state and clear the activation flag
    pub fn deactivate(&mut self, reason: DeactivationReason) {
        if self.state != DialogueState::Idle {
            self.transition_to(DialogueState::Idle);
        }

        if self.active {
            self.active = false;
            info!(%reason, "assistant deactivated");
            self.emit(StateEvent::Deactivated { reason });
        }
    }

    /// Validate a transition against the lifecycle table
    fn check(&self, to: DialogueState) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.state, to),
            (DialogueState::Idle, DialogueState::Listening)
                | (DialogueState::Listening, DialogueState::Thinking)
                | (DialogueState::Thinking, DialogueState::Speaking)
                | (DialogueState::Speaking, DialogueState::Listening)
        );

        if allowed {
            Ok(())
        } else {
            warn!(from = %self.state, to = %to, "rejected state transition");
            Err(TransitionError::Invalid {
                from: self.state,
                to,
            })
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: DialogueState) {
        let old_state = self.state;
        let duration_ms = self
            .state_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        self.state_entered_at = if new_state != DialogueState::Idle {
            Some(Instant::now())
        } else {
            None
        };

        self.emit(StateEvent::StateChanged {
            from: old_state,
            to: new_state,
            duration_ms,
        });
    }

    fn emit(&self, event: StateEvent) {
        debug!(?event, "emitting state event");
        let _ = self.event_tx.send(event);
    }
}
