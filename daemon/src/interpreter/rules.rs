//! Ordered keyword table for the ru-RU command set
//!
//! Order is priority: the first rule with any keyword present in the
//! lowercased utterance wins.

use super::intent::AppTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleKind {
    Launch,
    Search,
    MediaPlay,
    MediaPause,
    Weather,
    Time,
    Date,
    Reminder,
    Gratitude,
    Deactivate,
}

#[derive(Debug)]
pub(crate) struct Rule {
    pub kind: RuleKind,
    pub keywords: &'static [&'static str],
}

impl Rule {
    pub fn matches(&self, lowered: &str) -> bool {
        contains_any(lowered, self.keywords)
    }
}

pub(crate) const RULES: &[Rule] = &[
    Rule {
        kind: RuleKind::Launch,
        keywords: &["открой", "запусти"],
    },
    Rule {
        kind: RuleKind::Search,
        keywords: SEARCH_KEYWORDS,
    },
    Rule {
        kind: RuleKind::MediaPlay,
        keywords: &["музык", "песн", "включи"],
    },
    Rule {
        kind: RuleKind::MediaPause,
        keywords: &["пауза", "стоп"],
    },
    Rule {
        kind: RuleKind::Weather,
        keywords: &["погода"],
    },
    Rule {
        kind: RuleKind::Time,
        keywords: &["время", "который час"],
    },
    Rule {
        kind: RuleKind::Date,
        keywords: &["дата"],
    },
    Rule {
        kind: RuleKind::Reminder,
        keywords: &["напомни", "заметка"],
    },
    Rule {
        kind: RuleKind::Gratitude,
        keywords: &["спасибо"],
    },
    Rule {
        kind: RuleKind::Deactivate,
        keywords: &["выключись", "отключись"],
    },
];

pub(crate) const SEARCH_KEYWORDS: &[&str] = &["найди", "поищи", "найти"];

/// Removed from the utterance along with the search keywords
pub(crate) const SEARCH_NOISE: &str = "в интернете";

/// Launch targets, checked in order
pub(crate) const APP_TARGETS: &[(AppTarget, &[&str])] = &[
    (AppTarget::Browser, &["браузер", "chrome", "firefox"]),
    (AppTarget::Calculator, &["калькулятор"]),
    (AppTarget::Notepad, &["блокнот", "notepad"]),
];

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub(crate) fn first_match(lowered: &str) -> Option<RuleKind> {
    RULES.iter().find(|rule| rule.matches(lowered)).map(|rule| rule.kind)
}

pub(crate) fn app_target(lowered: &str) -> AppTarget {
    APP_TARGETS
        .iter()
        .find(|(_, keywords)| contains_any(lowered, keywords))
        .map(|(target, _)| *target)
        .unwrap_or(AppTarget::Unknown)
}

/// Strip search keywords and the "on the internet" phrase, then trim
///
/// One left-to-right pass: at each position the first noise phrase that
/// starts there is dropped, so text joined by a removal is kept as is.
pub(crate) fn search_query(lowered: &str) -> String {
    let mut query = String::with_capacity(lowered.len());
    let mut rest = lowered;

    while let Some(c) = rest.chars().next() {
        let noise = SEARCH_KEYWORDS
            .iter()
            .copied()
            .chain([SEARCH_NOISE])
            .find(|noise| rest.starts_with(*noise));

        match noise {
            Some(noise) => rest = &rest[noise.len()..],
            None => {
                query.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    query.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_order() {
        assert_eq!(first_match("открой музыку"), Some(RuleKind::Launch));
        assert_eq!(first_match("найди песню"), Some(RuleKind::Search));
        assert_eq!(first_match("включи песню"), Some(RuleKind::MediaPlay));
        assert_eq!(first_match("стоп"), Some(RuleKind::MediaPause));
        assert_eq!(first_match("выключись"), Some(RuleKind::Deactivate));
        assert_eq!(first_match("привет"), None);
    }

    #[test]
    fn test_app_target() {
        assert_eq!(app_target("открой firefox"), AppTarget::Browser);
        assert_eq!(app_target("запусти калькулятор"), AppTarget::Calculator);
        assert_eq!(app_target("открой notepad"), AppTarget::Notepad);
        assert_eq!(app_target("открой почту"), AppTarget::Unknown);
    }

    #[test]
    fn test_search_query_strips_all_occurrences() {
        assert_eq!(search_query("найди рецепт борща в интернете"), "рецепт борща");
        assert_eq!(search_query("поищи найти котиков"), "котиков");
        assert_eq!(search_query("найди"), "");
    }

    #[test]
    fn test_search_query_single_pass() {
        // Removing "найди" joins "най" and "ти" into a keyword that stays
        assert_eq!(search_query("найнайдити"), "найти");
        assert_eq!(search_query("в интернетенайди кино"), "кино");
    }
}
