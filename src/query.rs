//! Translation of sparse list parameters into a note filter.
//!
//! Every parameter is dispatched on presence. `level = Some(0)` is an exact
//! filter and is never confused with "no level given".

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::models::{Note, NoteType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteQuery {
    pub level: Option<u8>,
    pub level_gt: Option<u8>,
    pub level_lt: Option<u8>,
    #[serde(rename = "type")]
    pub note_type: Option<NoteType>,
    pub burned: Option<bool>,
    pub due: Option<bool>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    Exact(u8),
    /// Inclusive on both ends.
    Between { min: u8, max: u8 },
    AtLeast(u8),
    AtMost(u8),
}

impl LevelFilter {
    pub fn matches(&self, level: u8) -> bool {
        match *self {
            LevelFilter::Exact(l) => level == l,
            LevelFilter::Between { min, max } => (min..=max).contains(&level),
            LevelFilter::AtLeast(min) => level >= min,
            LevelFilter::AtMost(max) => level <= max,
        }
    }
}

/// Conjunction of the conditions a listed note must satisfy. An absent field
/// places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub level: Option<LevelFilter>,
    pub note_type: Option<NoteType>,
    pub burned: bool,
    pub due_before: Option<DateTime<Utc>>,
}

impl NoteFilter {
    pub fn is_empty(&self) -> bool {
        *self == NoteFilter::default()
    }

    pub fn matches(&self, note: &Note) -> bool {
        if let Some(level) = &self.level {
            if !level.matches(note.level) {
                return false;
            }
        }
        if let Some(note_type) = self.note_type {
            if note.note_type != note_type {
                return false;
            }
        }
        if self.burned && note.burned_at.is_none() {
            return false;
        }
        if let Some(threshold) = self.due_before {
            match note.due_at {
                Some(due) if due <= threshold => {}
                _ => return false,
            }
        }
        true
    }
}

pub fn build_filter(query: &NoteQuery, now: DateTime<Utc>) -> NoteFilter {
    let level = match (query.level, query.level_gt, query.level_lt) {
        (Some(level), _, _) => Some(LevelFilter::Exact(level)),
        (None, Some(min), Some(max)) => Some(LevelFilter::Between { min, max }),
        (None, Some(min), None) => Some(LevelFilter::AtLeast(min)),
        (None, None, Some(max)) => Some(LevelFilter::AtMost(max)),
        (None, None, None) => None,
    };

    // Both target due_at; an explicit threshold wins over "due now".
    let due_before = query.due_at.or(query.due.map(|_| now));

    NoteFilter {
        level,
        note_type: query.note_type,
        burned: query.burned.is_some(),
        due_before,
    }
}

impl FromStr for NoteQuery {
    type Err = ScheduleError;

    /// Parses whitespace separated terms such as `level=0 type=kanji due`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut query = NoteQuery::default();

        for term in s.split_whitespace() {
            let (key, value) = match term.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (term, None),
            };

            match key.to_lowercase().as_str() {
                "level" => query.level = Some(parse_level(key, value)?),
                "gt" | "level-gt" | "levelgt" => query.level_gt = Some(parse_level(key, value)?),
                "lt" | "level-lt" | "levellt" => query.level_lt = Some(parse_level(key, value)?),
                "type" => {
                    let raw = require(key, value)?;
                    query.note_type = Some(NoteType::from_str(raw).ok_or_else(|| {
                        ScheduleError::InvalidArgument(format!("unknown note type '{}'", raw))
                    })?);
                }
                "burned" => query.burned = Some(parse_flag(key, value)?),
                "due" => query.due = Some(parse_flag(key, value)?),
                "due-at" | "dueat" => {
                    let raw = require(key, value)?;
                    let at = DateTime::parse_from_rfc3339(raw).map_err(|e| {
                        ScheduleError::InvalidArgument(format!("invalid due-at '{}': {}", raw, e))
                    })?;
                    query.due_at = Some(at.with_timezone(&Utc));
                }
                // Bare words are taken as a note type for quick filtering.
                other => match NoteType::from_str(other) {
                    Some(t) if value.is_none() => query.note_type = Some(t),
                    _ => {
                        return Err(ScheduleError::InvalidArgument(format!(
                            "unknown filter '{}'",
                            term
                        )))
                    }
                },
            }
        }

        Ok(query)
    }
}

fn require<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, ScheduleError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ScheduleError::InvalidArgument(format!("'{}' needs a value", key)))
}

fn parse_level(key: &str, value: Option<&str>) -> Result<u8, ScheduleError> {
    let raw = require(key, value)?;
    raw.parse::<u8>()
        .map_err(|_| ScheduleError::InvalidArgument(format!("invalid level '{}'", raw)))
}

fn parse_flag(key: &str, value: Option<&str>) -> Result<bool, ScheduleError> {
    match value.map(|v| v.to_lowercase()) {
        None => Ok(true),
        Some(v) => match v.as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ScheduleError::InvalidArgument(format!(
                "'{}' expects a boolean, got '{}'",
                key, v
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn note(level: u8, note_type: NoteType, due_at: Option<DateTime<Utc>>) -> Note {
        Note {
            id: 1,
            creator_id: 1,
            text: "空".into(),
            meanings: vec!["sky".into()],
            readings: vec!["そら".into()],
            description: None,
            example_sentences: vec![],
            notes: None,
            tags: vec![],
            note_type,
            level,
            burned_at: if due_at.is_none() { Some(now()) } else { None },
            due_at,
            created_at: now(),
            revision: 0,
        }
    }

    mod build_filter_tests {
        use super::*;

        #[test]
        fn empty_query_is_unconstrained() {
            let filter = build_filter(&NoteQuery::default(), now());
            assert!(filter.is_empty());
        }

        #[test]
        fn level_zero_is_an_exact_filter() {
            let query = NoteQuery {
                level: Some(0),
                ..Default::default()
            };
            let filter = build_filter(&query, now());
            assert_eq!(filter.level, Some(LevelFilter::Exact(0)));
            assert!(!filter.is_empty());
        }

        #[test]
        fn exact_level_overrides_range() {
            let query = NoteQuery {
                level: Some(3),
                level_gt: Some(1),
                level_lt: Some(6),
                ..Default::default()
            };
            assert_eq!(build_filter(&query, now()).level, Some(LevelFilter::Exact(3)));
        }

        #[test]
        fn both_bounds_make_inclusive_range() {
            let query = NoteQuery {
                level_gt: Some(2),
                level_lt: Some(5),
                ..Default::default()
            };
            let filter = build_filter(&query, now());
            assert_eq!(filter.level, Some(LevelFilter::Between { min: 2, max: 5 }));
            let level = filter.level.unwrap();
            assert!(level.matches(2));
            assert!(level.matches(5));
            assert!(!level.matches(1));
            assert!(!level.matches(6));
        }

        #[test]
        fn one_sided_bounds() {
            let query = NoteQuery {
                level_gt: Some(2),
                ..Default::default()
            };
            let level = build_filter(&query, now()).level.unwrap();
            assert_eq!(level, LevelFilter::AtLeast(2));
            assert!(level.matches(8));
            assert!(!level.matches(1));

            let query = NoteQuery {
                level_lt: Some(0),
                ..Default::default()
            };
            assert_eq!(build_filter(&query, now()).level, Some(LevelFilter::AtMost(0)));
        }

        #[test]
        fn burned_is_presence_based() {
            for value in [true, false] {
                let query = NoteQuery {
                    burned: Some(value),
                    ..Default::default()
                };
                assert!(build_filter(&query, now()).burned);
            }
        }

        #[test]
        fn due_is_presence_based_and_uses_now() {
            for value in [true, false] {
                let query = NoteQuery {
                    due: Some(value),
                    ..Default::default()
                };
                assert_eq!(build_filter(&query, now()).due_before, Some(now()));
            }
        }

        #[test]
        fn explicit_due_at_overrides_due() {
            let threshold = now() + Duration::days(3);
            let query = NoteQuery {
                due: Some(true),
                due_at: Some(threshold),
                ..Default::default()
            };
            assert_eq!(build_filter(&query, now()).due_before, Some(threshold));
        }

        #[test]
        fn type_is_exact() {
            let query = NoteQuery {
                note_type: Some(NoteType::Kanji),
                ..Default::default()
            };
            assert_eq!(build_filter(&query, now()).note_type, Some(NoteType::Kanji));
        }
    }

    mod matches_tests {
        use super::*;

        #[test]
        fn level_zero_excludes_other_levels() {
            let filter = build_filter(
                &NoteQuery {
                    level: Some(0),
                    ..Default::default()
                },
                now(),
            );
            assert!(filter.matches(&note(0, NoteType::Word, Some(now()))));
            assert!(!filter.matches(&note(1, NoteType::Word, Some(now()))));
        }

        #[test]
        fn due_threshold_is_inclusive() {
            let filter = build_filter(
                &NoteQuery {
                    due: Some(true),
                    ..Default::default()
                },
                now(),
            );
            assert!(filter.matches(&note(1, NoteType::Word, Some(now()))));
            assert!(!filter.matches(&note(
                1,
                NoteType::Word,
                Some(now() + Duration::seconds(1))
            )));
            assert!(!filter.matches(&note(8, NoteType::Word, None)));
        }

        #[test]
        fn burned_requires_burned_at() {
            let filter = NoteFilter {
                burned: true,
                ..Default::default()
            };
            assert!(filter.matches(&note(8, NoteType::Kanji, None)));
            assert!(!filter.matches(&note(3, NoteType::Kanji, Some(now()))));
        }

        #[test]
        fn conditions_are_conjunctive() {
            let filter = NoteFilter {
                level: Some(LevelFilter::AtLeast(2)),
                note_type: Some(NoteType::Kanji),
                ..Default::default()
            };
            assert!(filter.matches(&note(3, NoteType::Kanji, Some(now()))));
            assert!(!filter.matches(&note(3, NoteType::Word, Some(now()))));
            assert!(!filter.matches(&note(1, NoteType::Kanji, Some(now()))));
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn empty_string_is_empty_query() {
            assert_eq!("".parse::<NoteQuery>().unwrap(), NoteQuery::default());
            assert_eq!("   ".parse::<NoteQuery>().unwrap(), NoteQuery::default());
        }

        #[test]
        fn parses_level_zero() {
            let q: NoteQuery = "level=0".parse().unwrap();
            assert_eq!(q.level, Some(0));
        }

        #[test]
        fn parses_all_terms() {
            let q: NoteQuery = "gt=2 lt=5 type=kanji burned due=false due-at=2024-06-01T00:00:00Z"
                .parse()
                .unwrap();
            assert_eq!(q.level_gt, Some(2));
            assert_eq!(q.level_lt, Some(5));
            assert_eq!(q.note_type, Some(NoteType::Kanji));
            assert_eq!(q.burned, Some(true));
            assert_eq!(q.due, Some(false));
            assert_eq!(
                q.due_at,
                Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
            );
        }

        #[test]
        fn bare_type_word() {
            let q: NoteQuery = "word".parse().unwrap();
            assert_eq!(q.note_type, Some(NoteType::Word));
        }

        #[test]
        fn rejects_bad_input() {
            assert!("level=abc".parse::<NoteQuery>().is_err());
            assert!("level=".parse::<NoteQuery>().is_err());
            assert!("level".parse::<NoteQuery>().is_err());
            assert!("type=radical".parse::<NoteQuery>().is_err());
            assert!("burned=maybe".parse::<NoteQuery>().is_err());
            assert!("due-at=tomorrow".parse::<NoteQuery>().is_err());
            assert!("colour=red".parse::<NoteQuery>().is_err());
        }
    }
}
