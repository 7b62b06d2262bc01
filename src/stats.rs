use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Note;

pub const TIMELINE_DAYS: usize = 7;
pub const TIMELINE_HOURS: usize = TIMELINE_DAYS * 24;

/// How far ahead the timeline looks.
pub fn timeline_window() -> Duration {
    Duration::days(TIMELINE_DAYS as i64)
}

/// Raw figures fetched by the caller for one user.
#[derive(Debug, Clone, Default)]
pub struct StatsInput {
    pub notes: i64,
    pub due_notes: i64,
    pub burned_notes: i64,
    /// Non-burned notes due within the timeline window.
    pub due_within_week: Vec<Note>,
    /// Counts for levels `0..=max_level`, the last entry being burned notes.
    pub notes_per_level: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub notes: i64,
    pub due_notes: i64,
    pub burned_notes: i64,
    /// `timeline[hour][level]`: notes of `level` coming due in that hour.
    pub timeline: Vec<Vec<u32>>,
    pub notes_per_level: Vec<i64>,
}

impl UserStats {
    /// Notes coming due in each of the next seven days, across all levels.
    pub fn due_per_day(&self) -> Vec<u32> {
        self.timeline
            .chunks(24)
            .map(|day| day.iter().flatten().sum::<u32>())
            .collect()
    }
}

/// Index of the hourly bucket for a note due at `due_at`.
///
/// Overdue notes land in bucket 0. The ceiling can reach `TIMELINE_HOURS`
/// for a note due within the final hour of the window; such notes are clamped
/// into the last bucket rather than dropped.
pub fn hour_bucket(due_at: DateTime<Utc>, now: DateTime<Utc>) -> usize {
    let delta = due_at.signed_duration_since(now);
    if delta <= Duration::zero() {
        return 0;
    }
    let whole = delta.num_hours();
    let hours = if delta > Duration::hours(whole) {
        whole + 1
    } else {
        whole
    };
    usize::try_from(hours)
        .unwrap_or(usize::MAX)
        .min(TIMELINE_HOURS - 1)
}

pub fn aggregate(input: StatsInput, max_level: u8, now: DateTime<Utc>) -> UserStats {
    let columns = max_level as usize;
    let mut timeline = vec![vec![0u32; columns]; TIMELINE_HOURS];

    for note in &input.due_within_week {
        let Some(due_at) = note.due_at else {
            continue;
        };
        let level = note.level as usize;
        if level >= columns {
            continue;
        }
        timeline[hour_bucket(due_at, now)][level] += 1;
    }

    let mut notes_per_level = input.notes_per_level;
    notes_per_level.resize(columns + 1, 0);

    UserStats {
        notes: input.notes,
        due_notes: input.due_notes,
        burned_notes: input.burned_notes,
        timeline,
        notes_per_level,
    }
}
