//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::StateEvent;
use crate::history::Command;
use crate::session::SessionStatus;
use crate::transcript::RecognitionErrorCode;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current session status
    GetStatus,

    /// Turn the microphone on
    StartSession,

    /// Turn the microphone off
    StopSession,

    /// Deliver recognized text to the session
    SubmitTranscript {
        text: String,
        #[serde(default = "default_is_final")]
        is_final: bool,
    },

    /// Relay a recognizer error, e.g. `no-speech`
    ReportRecognitionError { code: RecognitionErrorCode },

    /// Relay the end of the recognizer's stream
    ReportStreamEnd,

    /// Request the command history, newest first
    ListHistory,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to state change notifications
    Subscribe,
}

fn default_is_final() -> bool {
    true
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current session status
    Status(SessionStatus),

    /// Microphone is on
    SessionStarted,

    /// Microphone is off
    SessionStopped,

    /// Transcript queued for the session
    Accepted,

    /// Command history, newest first
    History { commands: Vec<Command> },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl std::fmt::Display) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// State event occurred
    StateEvent { event: StateEvent },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SubmitTranscript {
            text: "который час".to_string(),
            is_final: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("submit_transcript"));
        assert!(json.contains("который час"));
    }

    #[test]
    fn test_submit_defaults_to_final() {
        let json = r#"{"type":"submit_transcript","text":"стоп"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(req, Request::SubmitTranscript { is_final: true, .. }));
    }

    #[test]
    fn test_recognition_error_uses_wire_code() {
        let json = r#"{"type":"report_recognition_error","code":"no-speech"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(
            req,
            Request::ReportRecognitionError {
                code: RecognitionErrorCode::NoSpeech
            }
        ));

        let json = r#"{"type":"report_stream_end"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(req, Request::ReportStreamEnd));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(SessionStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"state\":\"idle\""));
    }

    #[test]
    fn test_notification_wraps_event() {
        let note = Notification::StateEvent {
            event: StateEvent::Activated,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(json, r#"{"type":"state_event","event":{"type":"activated"}}"#);
    }
}
