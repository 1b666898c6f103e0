//! Rule-based command interpreter
//!
//! Maps a finalized utterance to a response and a [`Category`] by
//! case-insensitive substring matching over an ordered rule table. The
//! first matching rule wins; utterances matching nothing get a fallback
//! reply, so interpretation never fails.
//!
//! Interpretation has no side effects. Deactivation is reported through
//! [`Intent::Deactivate`] and scheduled by the session.

mod intent;
mod rules;

use chrono::{Local, NaiveDateTime, Timelike};
use tracing::debug;

pub use intent::{AppTarget, Category, Intent, Interpretation};
use rules::RuleKind;

const REPLY_WEATHER: &str = "Сегодня +5°C, облачно с прояснениями";
const REPLY_REMINDER: &str = "Напоминание создано";
const REPLY_GRATITUDE: &str = "Всегда пожалуйста!";
const REPLY_FAREWELL: &str = "До встречи!";
const REPLY_UNRECOGNIZED: &str = "Команда не распознана. Попробуйте сформулировать иначе";

/// Stateless classifier for the ru-RU command set
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInterpreter;

impl CommandInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Classify `utterance` against the local wall clock
    pub fn interpret(&self, utterance: &str) -> Interpretation {
        self.interpret_at(utterance, Local::now().naive_local())
    }

    /// Classify `utterance`, answering time and date queries from `now`
    pub fn interpret_at(&self, utterance: &str, now: NaiveDateTime) -> Interpretation {
        let lowered = utterance.to_lowercase();

        let intent = match rules::first_match(&lowered) {
            Some(RuleKind::Launch) => Intent::Launch(rules::app_target(&lowered)),
            Some(RuleKind::Search) => Intent::Search {
                query: rules::search_query(&lowered),
            },
            Some(RuleKind::MediaPlay) => Intent::MediaPlay,
            Some(RuleKind::MediaPause) => Intent::MediaPause,
            Some(RuleKind::Weather) => Intent::Weather,
            Some(RuleKind::Time) => Intent::Time,
            Some(RuleKind::Date) => Intent::Date,
            Some(RuleKind::Reminder) => Intent::Reminder,
            Some(RuleKind::Gratitude) => Intent::Gratitude,
            Some(RuleKind::Deactivate) => Intent::Deactivate,
            None => Intent::Unrecognized,
        };

        let response = respond(&intent, now);
        debug!(utterance, ?intent, %response, "utterance classified");

        Interpretation { intent, response }
    }
}

fn respond(intent: &Intent, now: NaiveDateTime) -> String {
    match intent {
        Intent::Launch(target) => match target {
            AppTarget::Browser => "Открываю браузер".to_string(),
            AppTarget::Calculator => "Открываю калькулятор".to_string(),
            AppTarget::Notepad => "Открываю блокнот".to_string(),
            AppTarget::Unknown => "Команда распознана, но приложение не найдено".to_string(),
        },
        Intent::Search { query } => format!("Ищу информацию: {}", query),
        Intent::MediaPlay => "Включаю музыку".to_string(),
        Intent::MediaPause => "Ставлю на паузу".to_string(),
        Intent::Weather => REPLY_WEATHER.to_string(),
        Intent::Time => format!("Сейчас {}:{:02}", now.hour(), now.minute()),
        Intent::Date => format!("Сегодня {}", now.format("%d.%m.%Y")),
        Intent::Reminder => REPLY_REMINDER.to_string(),
        Intent::Gratitude => REPLY_GRATITUDE.to_string(),
        Intent::Deactivate => REPLY_FAREWELL.to_string(),
        Intent::Unrecognized => REPLY_UNRECOGNIZED.to_string(),
    }
}
