pub mod dashboard;
pub mod note_detail;
pub mod notes;

use chrono::{DateTime, Utc};

use crate::models::Note;

pub fn level_bar(level: u8, max_level: u8) -> String {
    let filled = level.min(max_level) as usize;
    let empty = max_level as usize - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Short due description for list rows: `burned`, `now`, or a date.
pub fn format_due(note: &Note, now: DateTime<Utc>) -> String {
    match note.due_at {
        None => "burned".to_string(),
        Some(due) if due <= now => "now".to_string(),
        Some(due) => due.format("%b %d %H:%M").to_string(),
    }
}
