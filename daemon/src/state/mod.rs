//! Dialogue state machine module
//!
//! Provides an explicit state machine with four states:
//! - Idle: microphone off, or waiting for the wake phrase
//! - Listening: active, ready for a command
//! - Thinking: a command is being classified
//! - Speaking: the response is being spoken

mod machine;

pub use machine::{DialogueState, StateMachine};
