//! Transcript module for recognized speech input
//!
//! Defines the events a speech recognizer delivers and the
//! [`TranscriptSource`] seam the session subscribes through.

mod event;
mod lines;
mod source;

pub use event::{RecognitionErrorCode, SourceEvent, TranscriptEvent};
pub use lines::LineSource;
pub use source::{ExternalSource, TranscriptSource, UnsupportedSource};
