//! Classification results

use serde::{Deserialize, Serialize};

/// Closed set of labels attached to every processed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    App,
    Search,
    Media,
    Info,
    System,
    Note,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Category::App => "app",
            Category::Search => "search",
            Category::Media => "media",
            Category::Info => "info",
            Category::System => "system",
            Category::Note => "note",
        };
        f.write_str(label)
    }
}

/// Application named in a launch command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTarget {
    Browser,
    Calculator,
    Notepad,
    /// Launch keyword present but no known application named
    Unknown,
}

/// The rule that matched an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Launch(AppTarget),
    Search { query: String },
    MediaPlay,
    MediaPause,
    Weather,
    Time,
    Date,
    Reminder,
    Gratitude,
    /// Farewell; the session deactivates after the reply is spoken
    Deactivate,
    /// No rule matched
    Unrecognized,
}

impl Intent {
    pub fn category(&self) -> Category {
        match self {
            Intent::Launch(_) => Category::App,
            Intent::Search { .. } => Category::Search,
            Intent::MediaPlay | Intent::MediaPause => Category::Media,
            Intent::Weather | Intent::Time | Intent::Date => Category::Info,
            Intent::Reminder => Category::Note,
            Intent::Gratitude | Intent::Deactivate | Intent::Unrecognized => Category::System,
        }
    }

    pub fn is_deactivation(&self) -> bool {
        matches!(self, Intent::Deactivate)
    }
}

/// Response text plus the intent it was produced for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub intent: Intent,
    pub response: String,
}

impl Interpretation {
    pub fn category(&self) -> Category {
        self.intent.category()
    }

    /// The `(response, category)` pair
    pub fn into_parts(self) -> (String, Category) {
        let category = self.intent.category();
        (self.response, category)
    }
}
