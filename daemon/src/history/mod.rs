//! Session-scoped command history
//!
//! Append-only, newest first. Entries live as long as the daemon process.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::interpreter::{Category, Interpretation};

/// One processed exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    id: u64,
    text: String,
    timestamp: DateTime<Local>,
    response: String,
    category: Category,
}

impl Command {
    pub fn new(
        id: u64,
        text: impl Into<String>,
        interpretation: Interpretation,
        timestamp: DateTime<Local>,
    ) -> Self {
        let (response, category) = interpretation.into_parts();
        Self {
            id,
            text: text.into(),
            timestamp,
            response,
            category,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The utterance as received
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

/// Ordered log of processed commands
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: VecDeque<Command>,
    next_id: u64,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the id for the next command
    ///
    /// Ids start at 1 and increase by one per call.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Prepend a command
    pub fn append(&mut self, command: Command) {
        self.entries.push_front(command);
    }

    /// Commands, newest first
    pub fn list(&self) -> impl ExactSizeIterator<Item = &Command> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&Command> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::CommandInterpreter;

    fn command(history: &mut CommandHistory, text: &str) -> Command {
        let interpretation = CommandInterpreter::new().interpret(text);
        Command::new(history.next_id(), text, interpretation, Local::now())
    }

    #[test]
    fn test_empty() {
        let history = CommandHistory::new();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
        assert_eq!(history.list().len(), 0);
    }

    #[test]
    fn test_newest_first() {
        let mut history = CommandHistory::new();
        let c1 = command(&mut history, "спасибо");
        let c2 = command(&mut history, "какая погода");

        history.append(c1.clone());
        history.append(c2.clone());

        let listed: Vec<&Command> = history.list().collect();
        assert_eq!(listed, vec![&c2, &c1]);
        assert_eq!(history.latest(), Some(&c2));
        assert_eq!(history.list().cloned().collect::<Vec<_>>(), vec![c2, c1]);
    }

    #[test]
    fn test_ids_unique_and_increasing() {
        let mut history = CommandHistory::new();
        let ids: Vec<u64> = (0..5).map(|_| history.next_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_no_deduplication() {
        let mut history = CommandHistory::new();
        for _ in 0..3 {
            let c = command(&mut history, "стоп");
            history.append(c);
        }
        assert_eq!(history.len(), 3);
        assert!(history.list().all(|c| c.category() == Category::Media));
    }

    #[test]
    fn test_command_fields() {
        let mut history = CommandHistory::new();
        let c = command(&mut history, "Найди котиков");
        assert_eq!(c.id(), 1);
        assert_eq!(c.text(), "Найди котиков");
        assert_eq!(c.response(), "Ищу информацию: котиков");
        assert_eq!(c.category(), Category::Search);
        assert!(c.timestamp() <= Local::now());
    }

    #[test]
    fn test_command_json_roundtrip() {
        let mut history = CommandHistory::new();
        let c = command(&mut history, "напомни позвонить");
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"category\":\"note\""));
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
