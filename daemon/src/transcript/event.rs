//! Recognition events delivered by a transcript source

use serde::{Deserialize, Serialize};

/// A recognition update for the current turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Every fragment recognized so far in this turn
    pub fragments: Vec<String>,
    /// Whether the last fragment is stable
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn new(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            fragments: vec![text.into()],
            is_final,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    /// Candidate text: all fragments of the turn concatenated
    pub fn text(&self) -> String {
        self.fragments.concat()
    }
}

/// Recognition failure codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecognitionErrorCode {
    /// Nothing was said before the recognizer gave up
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    Other(String),
}

impl RecognitionErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            RecognitionErrorCode::NoSpeech => "no-speech",
            RecognitionErrorCode::Aborted => "aborted",
            RecognitionErrorCode::AudioCapture => "audio-capture",
            RecognitionErrorCode::Network => "network",
            RecognitionErrorCode::NotAllowed => "not-allowed",
            RecognitionErrorCode::Other(code) => code,
        }
    }
}

impl From<&str> for RecognitionErrorCode {
    fn from(code: &str) -> Self {
        match code.trim() {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for RecognitionErrorCode {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<RecognitionErrorCode> for String {
    fn from(code: RecognitionErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl std::fmt::Display for RecognitionErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a source can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Transcript(TranscriptEvent),
    Error(RecognitionErrorCode),
    /// The recognition stream ended
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_concatenates_fragments() {
        let event = TranscriptEvent {
            fragments: vec!["найди ".to_string(), "рецепт ".to_string(), "борща".to_string()],
            is_final: true,
        };
        assert_eq!(event.text(), "найди рецепт борща");
    }

    #[test]
    fn test_constructors() {
        assert!(TranscriptEvent::final_text("стоп").is_final);
        assert!(!TranscriptEvent::interim("сто").is_final);
    }

    #[test]
    fn test_error_code_roundtrip() {
        for code in ["no-speech", "aborted", "audio-capture", "network", "not-allowed", "bad-grammar"] {
            let parsed = RecognitionErrorCode::from(code);
            assert_eq!(parsed.as_str(), code);
        }
        assert_eq!(RecognitionErrorCode::from("no-speech"), RecognitionErrorCode::NoSpeech);
        assert_eq!(
            RecognitionErrorCode::from("bad-grammar"),
            RecognitionErrorCode::Other("bad-grammar".to_string())
        );
    }
}
