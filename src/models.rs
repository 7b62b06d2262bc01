use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ScheduleError};

pub const MIN_LIST_ENTRIES: usize = 1;
pub const MAX_LIST_ENTRIES: usize = 30;
pub const MIN_USER_NAME_LEN: usize = 3;
pub const MAX_USER_NAME_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Word,
    Kanji,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Word => "word",
            NoteType::Kanji => "kanji",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "word" | "w" => Some(NoteType::Word),
            "kanji" | "k" => Some(NoteType::Kanji),
            _ => None,
        }
    }
}

/// A single vocabulary or kanji item together with its review schedule.
///
/// `due_at` is set exactly while the note is active and `burned_at` exactly
/// once it is burned. Only the scheduler moves a note between those states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub creator_id: i64,
    pub text: String,
    pub meanings: Vec<String>,
    pub readings: Vec<String>,
    pub description: Option<String>,
    pub example_sentences: Vec<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub level: u8,
    pub due_at: Option<DateTime<Utc>>,
    pub burned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

impl Note {
    /// Milliseconds until the note is due, negative when overdue.
    pub fn due_in(&self, now: DateTime<Utc>) -> Option<i64> {
        self.due_at
            .map(|due| due.signed_duration_since(now).num_milliseconds())
    }
}

pub fn level_label(level: u8) -> &'static str {
    match level {
        0 => "Apprentice I",
        1 => "Apprentice II",
        2 => "Apprentice III",
        3 => "Apprentice IV",
        4 => "Guru I",
        5 => "Guru II",
        6 => "Master",
        7 => "Enlightened",
        8 => "Burned",
        _ => "Unknown",
    }
}

/// Creation payload for a note, checked before anything is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewNote {
    pub text: String,
    pub meanings: Vec<String>,
    pub readings: Vec<String>,
    pub description: Option<String>,
    pub example_sentences: Vec<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub note_type: NoteType,
}

impl NewNote {
    pub fn validate(&self) -> Result<(), Error> {
        if self.text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
        validate_list("meanings", &self.meanings)?;
        validate_list("readings", &self.readings)?;
        if self.example_sentences.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::Validation(
                "example sentences must not be empty".into(),
            ));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Validation("tags must not be empty".into()));
        }
        Ok(())
    }
}

fn validate_list(field: &str, items: &[String]) -> Result<(), Error> {
    if items.len() < MIN_LIST_ENTRIES || items.len() > MAX_LIST_ENTRIES {
        return Err(Error::Validation(format!(
            "{} must have between {} and {} entries, got {}",
            field,
            MIN_LIST_ENTRIES,
            MAX_LIST_ENTRIES,
            items.len()
        )));
    }
    if items.iter().any(|s| s.trim().is_empty()) {
        return Err(Error::Validation(format!(
            "{} must not contain empty entries",
            field
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub fn validate_user_name(name: &str) -> Result<(), Error> {
    let len = name.chars().count();
    if !(MIN_USER_NAME_LEN..=MAX_USER_NAME_LEN).contains(&len) {
        return Err(Error::Validation(format!(
            "user name must be between {} and {} characters",
            MIN_USER_NAME_LEN, MAX_USER_NAME_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub note_count: i64,
}

/// Outcome of one review. The signed amount form mirrors how reviews are
/// submitted: `1` for a correct answer, `-k` for `k` incorrect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewOutcome {
    Correct,
    Incorrect(u32),
}

impl ReviewOutcome {
    pub fn from_amount(amount: i64) -> Result<Self, ScheduleError> {
        match amount {
            1 => Ok(ReviewOutcome::Correct),
            n if n < 0 => u32::try_from(n.unsigned_abs())
                .map(ReviewOutcome::Incorrect)
                .map_err(|_| ScheduleError::InvalidArgument(format!("amount {} is too large", n))),
            n => Err(ScheduleError::InvalidArgument(format!(
                "amount must be 1 or negative, got {}",
                n
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Correct => "correct",
            ReviewOutcome::Incorrect(_) => "incorrect",
        }
    }
}

/// Result of a recorded review, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub level: u8,
    pub due_at: Option<DateTime<Utc>>,
    pub due_in: Option<i64>,
    pub burned: bool,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
