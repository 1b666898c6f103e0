//! Wake phrase detection on finalized transcripts

use tracing::{debug, info};

use crate::config::ConfigError;

/// Detects the activation phrase in recognized text
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    phrase: String,
}

impl WakeWordDetector {
    /// Create a detector for `phrase`, normalized to trimmed lowercase
    pub fn new(phrase: &str) -> Result<Self, ConfigError> {
        let phrase = phrase.trim().to_lowercase();
        if phrase.is_empty() {
            return Err(ConfigError::EmptyWakePhrase);
        }

        debug!(%phrase, "wake word detector initialized");
        Ok(Self { phrase })
    }

    /// Check if a finalized transcript contains the wake phrase
    pub fn detect(&self, transcript: &str) -> bool {
        let found = transcript.to_lowercase().contains(&self.phrase);
        if found {
            info!(phrase = %self.phrase, transcript, "wake word detected");
        }
        found
    }

    /// The normalized phrase
    pub fn phrase(&self) -> &str {
        &self.phrase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_normalization() {
        let detector = WakeWordDetector::new("  СаТеЛа ").unwrap();
        assert_eq!(detector.phrase(), "сатела");
    }

    #[test]
    fn test_empty_phrase_rejected() {
        assert!(matches!(
            WakeWordDetector::new("   "),
            Err(ConfigError::EmptyWakePhrase)
        ));
    }

    #[test]
    fn test_detects_substring_case_insensitive() {
        let detector = WakeWordDetector::new("сатела").unwrap();
        assert!(detector.detect("Сатела"));
        assert!(detector.detect("привет САТЕЛА как дела"));
        assert!(detector.detect("сателлит? нет, сатела"));
    }

    #[test]
    fn test_no_match() {
        let detector = WakeWordDetector::new("сатела").unwrap();
        assert!(!detector.detect("который час"));
        assert!(!detector.detect(""));
        assert!(!detector.detect("сате ла"));
    }
}
