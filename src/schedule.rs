//! Spaced-repetition scheduling.
//!
//! A note climbs one level per correct review and falls back after incorrect
//! ones. Each level maps to a wait time in the [`IntervalTable`]; once a note
//! climbs past the last entry it is burned and never reviewed again.
//!
//! Every function takes `now` explicitly, so the engine never reads a clock.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::error::ScheduleError;
use crate::models::{NewNote, Note, ReviewOutcome};

/// Levels at or above this regress twice as fast on an incorrect answer.
pub const PENALTY_LEVEL: u8 = 4;

fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

fn days(n: i64) -> Duration {
    hours(n * 24)
}

fn weeks(n: i64) -> Duration {
    days(n * 7)
}

// A "month" in the schedule is exactly four weeks.
fn months(n: i64) -> Duration {
    weeks(n * 4)
}

/// Ordered wait durations indexed by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable {
    intervals: Vec<Duration>,
}

impl IntervalTable {
    pub fn standard() -> Self {
        Self {
            intervals: vec![
                hours(4),
                hours(8),
                days(1),
                days(2),
                weeks(1),
                weeks(2),
                months(1),
                months(4),
            ],
        }
    }

    /// The burned level; active levels are `0..max_level()`.
    pub fn max_level(&self) -> u8 {
        self.intervals.len() as u8
    }

    pub fn interval(&self, level: u8) -> Option<Duration> {
        self.intervals.get(level as usize).copied()
    }
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Rounds up to the next whole hour. An instant already on the hour is
/// returned unchanged.
pub fn ceil_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let into_hour = Duration::minutes(t.minute() as i64)
        + Duration::seconds(t.second() as i64)
        + Duration::nanoseconds(t.nanosecond() as i64);
    if into_hour == Duration::zero() {
        t
    } else {
        t - into_hour + hours(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    table: IntervalTable,
}

impl Scheduler {
    pub fn new(table: IntervalTable) -> Self {
        Self { table }
    }

    pub fn max_level(&self) -> u8 {
        self.table.max_level()
    }

    pub fn compute_due_date(
        &self,
        level: u8,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let interval = self.table.interval(level).ok_or_else(|| {
            ScheduleError::InvalidState(format!("level {} is burned and has no due date", level))
        })?;
        Ok(ceil_hour(now + interval))
    }

    pub fn is_burned(&self, note: &Note) -> bool {
        note.level >= self.max_level()
    }

    /// Strictly after the due instant. The catalog's "due" filter uses
    /// `due_at <= now` instead; the two are intentionally different.
    pub fn is_reviewable(&self, note: &Note, now: DateTime<Utc>) -> bool {
        !self.is_burned(note) && note.due_at.is_some_and(|due| due < now)
    }

    /// Builds a fresh level 0 note anchored at `now`. The id and revision are
    /// left for the store to assign.
    pub fn new_note(
        &self,
        creator_id: i64,
        payload: NewNote,
        now: DateTime<Utc>,
    ) -> Result<Note, ScheduleError> {
        let due_at = self.compute_due_date(0, now)?;
        Ok(Note {
            id: 0,
            creator_id,
            text: payload.text,
            meanings: payload.meanings,
            readings: payload.readings,
            description: payload.description,
            example_sentences: payload.example_sentences,
            notes: payload.notes,
            tags: payload.tags,
            note_type: payload.note_type,
            level: 0,
            due_at: Some(due_at),
            burned_at: None,
            created_at: now,
            revision: 0,
        })
    }

    pub fn level_up(&self, note: &mut Note, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        if !self.is_reviewable(note, now) {
            return Err(ScheduleError::NotReviewable);
        }

        let level = note.level + 1;
        if level >= self.max_level() {
            note.level = level;
            note.burned_at = Some(now);
            note.due_at = None;
        } else {
            note.due_at = Some(self.compute_due_date(level, now)?);
            note.level = level;
        }
        Ok(())
    }

    pub fn level_down(
        &self,
        note: &mut Note,
        now: DateTime<Utc>,
        times_incorrect: u32,
    ) -> Result<(), ScheduleError> {
        if !self.is_reviewable(note, now) {
            return Err(ScheduleError::NotReviewable);
        }
        if times_incorrect == 0 {
            return Err(ScheduleError::InvalidArgument(
                "times incorrect must be positive".into(),
            ));
        }

        let mut level = note.level;
        if level != 0 {
            let penalty: i64 = if level >= PENALTY_LEVEL { 2 } else { 1 };
            let dropped = level as i64 - times_incorrect as i64 * penalty;
            level = dropped.max(0) as u8;
        }
        // Even a level 0 note gets its timer reset.
        note.due_at = Some(self.compute_due_date(level, now)?);
        note.level = level;
        Ok(())
    }

    pub fn apply(
        &self,
        note: &mut Note,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        match outcome {
            ReviewOutcome::Correct => self.level_up(note, now),
            ReviewOutcome::Incorrect(times) => self.level_down(note, now, times),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteType;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        at(2024, 3, 10, 9, 15, 30)
    }

    fn note_at(level: u8, due_at: Option<DateTime<Utc>>) -> Note {
        Note {
            id: 1,
            creator_id: 1,
            text: "水".into(),
            meanings: vec!["water".into()],
            readings: vec!["みず".into()],
            description: None,
            example_sentences: vec![],
            notes: None,
            tags: vec![],
            note_type: NoteType::Kanji,
            level,
            due_at,
            burned_at: None,
            created_at: t0(),
            revision: 0,
        }
    }

    /// A note at `level` whose due date passed an hour before `t0()`.
    fn due_note(level: u8) -> Note {
        note_at(level, Some(t0() - hours(1)))
    }

    mod interval_table_tests {
        use super::*;

        #[test]
        fn standard_table_has_eight_levels() {
            let table = IntervalTable::standard();
            assert_eq!(table.max_level(), 8);
            assert_eq!(table.interval(0), Some(hours(4)));
            assert_eq!(table.interval(1), Some(hours(8)));
            assert_eq!(table.interval(2), Some(hours(24)));
            assert_eq!(table.interval(3), Some(hours(48)));
            assert_eq!(table.interval(4), Some(hours(24 * 7)));
            assert_eq!(table.interval(5), Some(hours(24 * 14)));
            assert_eq!(table.interval(6), Some(hours(24 * 28)));
            assert_eq!(table.interval(7), Some(hours(24 * 112)));
            assert_eq!(table.interval(8), None);
        }

        #[test]
        fn default_is_standard() {
            assert_eq!(IntervalTable::default(), IntervalTable::standard());
        }
    }

    mod ceil_hour_tests {
        use super::*;

        #[test]
        fn rounds_up_partial_hour() {
            assert_eq!(ceil_hour(at(2024, 1, 1, 12, 20, 0)), at(2024, 1, 1, 13, 0, 0));
        }

        #[test]
        fn exact_hour_is_unchanged() {
            assert_eq!(ceil_hour(at(2024, 1, 1, 12, 0, 0)), at(2024, 1, 1, 12, 0, 0));
        }

        #[test]
        fn sub_second_component_rounds_up() {
            let t = at(2024, 1, 1, 12, 0, 0) + Duration::milliseconds(1);
            assert_eq!(ceil_hour(t), at(2024, 1, 1, 13, 0, 0));
        }

        #[test]
        fn crosses_midnight() {
            assert_eq!(ceil_hour(at(2024, 12, 31, 23, 59, 59)), at(2025, 1, 1, 0, 0, 0));
        }
    }

    mod due_date_tests {
        use super::*;

        #[test]
        fn level_zero_from_partial_hour() {
            let s = Scheduler::default();
            assert_eq!(s.compute_due_date(0, t0()).unwrap(), at(2024, 3, 10, 14, 0, 0));
        }

        #[test]
        fn due_dates_are_on_the_hour_within_an_hour_of_the_interval() {
            let s = Scheduler::default();
            let starts = [
                t0(),
                at(2024, 3, 10, 9, 0, 0),
                at(2024, 2, 29, 23, 59, 59) + Duration::nanoseconds(999),
            ];
            for now in starts {
                for level in 0..s.max_level() {
                    let due = s.compute_due_date(level, now).unwrap();
                    let floor = now + IntervalTable::standard().interval(level).unwrap();
                    assert_eq!(due.minute(), 0);
                    assert_eq!(due.second(), 0);
                    assert_eq!(due.nanosecond(), 0);
                    assert!(due >= floor);
                    assert!(due - floor < hours(1));
                }
            }
        }

        #[test]
        fn burned_level_is_invalid_state() {
            let s = Scheduler::default();
            assert!(matches!(
                s.compute_due_date(8, t0()),
                Err(ScheduleError::InvalidState(_))
            ));
            assert!(matches!(
                s.compute_due_date(200, t0()),
                Err(ScheduleError::InvalidState(_))
            ));
        }
    }

    mod reviewable_tests {
        use super::*;

        #[test]
        fn past_due_note_is_reviewable() {
            let s = Scheduler::default();
            assert!(s.is_reviewable(&due_note(2), t0()));
        }

        #[test]
        fn note_due_exactly_now_is_not_reviewable() {
            let s = Scheduler::default();
            let note = note_at(2, Some(t0()));
            assert!(!s.is_reviewable(&note, t0()));
            assert!(s.is_reviewable(&note, t0() + Duration::milliseconds(1)));
        }

        #[test]
        fn future_note_is_not_reviewable() {
            let s = Scheduler::default();
            let note = note_at(0, Some(t0() + hours(2)));
            assert!(!s.is_reviewable(&note, t0()));
        }

        #[test]
        fn burned_note_is_never_reviewable() {
            let s = Scheduler::default();
            let mut note = note_at(8, None);
            note.burned_at = Some(t0());
            assert!(s.is_burned(&note));
            assert!(!s.is_reviewable(&note, t0() + weeks(100)));
        }

        #[test]
        fn missing_due_date_is_not_reviewable() {
            let s = Scheduler::default();
            assert!(!s.is_reviewable(&note_at(3, None), t0()));
        }
    }

    mod new_note_tests {
        use super::*;

        #[test]
        fn starts_at_level_zero_due_after_first_interval() {
            let s = Scheduler::default();
            let payload = NewNote {
                text: "山".into(),
                meanings: vec!["mountain".into()],
                readings: vec!["やま".into()],
                tags: vec!["nature".into()],
                note_type: NoteType::Kanji,
                ..Default::default()
            };
            let note = s.new_note(7, payload, t0()).unwrap();
            assert_eq!(note.creator_id, 7);
            assert_eq!(note.level, 0);
            assert_eq!(note.due_at, Some(s.compute_due_date(0, t0()).unwrap()));
            assert!(note.burned_at.is_none());
            assert_eq!(note.created_at, t0());
            assert_eq!(note.tags, vec!["nature".to_string()]);
            assert_eq!(note.note_type, NoteType::Kanji);
        }
    }

    mod level_up_tests {
        use super::*;

        #[test]
        fn advances_one_level_and_reschedules() {
            let s = Scheduler::default();
            let mut note = due_note(2);
            s.level_up(&mut note, t0()).unwrap();
            assert_eq!(note.level, 3);
            assert_eq!(note.due_at, Some(s.compute_due_date(3, t0()).unwrap()));
            assert!(note.due_at.unwrap() > t0());
            assert!(note.burned_at.is_none());
        }

        #[test]
        fn last_level_burns() {
            let s = Scheduler::default();
            let mut note = due_note(7);
            s.level_up(&mut note, t0()).unwrap();
            assert_eq!(note.level, 8);
            assert_eq!(note.burned_at, Some(t0()));
            assert!(note.due_at.is_none());
            assert!(s.is_burned(&note));
        }

        #[test]
        fn future_note_is_rejected_untouched() {
            let s = Scheduler::default();
            let mut note = note_at(3, Some(t0() + hours(1)));
            let before = note.clone();
            assert_eq!(s.level_up(&mut note, t0()), Err(ScheduleError::NotReviewable));
            assert_eq!(note, before);
        }

        #[test]
        fn burned_note_is_rejected_untouched() {
            let s = Scheduler::default();
            let mut note = note_at(8, None);
            note.burned_at = Some(t0() - days(3));
            let before = note.clone();
            assert_eq!(s.level_up(&mut note, t0()), Err(ScheduleError::NotReviewable));
            assert_eq!(note, before);
        }
    }

    mod level_down_tests {
        use super::*;

        #[test]
        fn low_levels_drop_one_per_mistake() {
            let s = Scheduler::default();
            let mut note = due_note(3);
            s.level_down(&mut note, t0(), 1).unwrap();
            assert_eq!(note.level, 2);

            let mut note = due_note(3);
            s.level_down(&mut note, t0(), 2).unwrap();
            assert_eq!(note.level, 1);
        }

        #[test]
        fn mature_levels_drop_two_per_mistake() {
            let s = Scheduler::default();
            let mut note = due_note(4);
            s.level_down(&mut note, t0(), 1).unwrap();
            assert_eq!(note.level, 2);

            let mut note = due_note(7);
            s.level_down(&mut note, t0(), 2).unwrap();
            assert_eq!(note.level, 3);
        }

        #[test]
        fn floors_at_zero() {
            let s = Scheduler::default();
            let mut note = due_note(5);
            s.level_down(&mut note, t0(), 10).unwrap();
            assert_eq!(note.level, 0);

            let mut note = due_note(1);
            s.level_down(&mut note, t0(), u32::MAX).unwrap();
            assert_eq!(note.level, 0);
        }

        #[test]
        fn reschedules_for_new_level() {
            let s = Scheduler::default();
            let mut note = due_note(6);
            s.level_down(&mut note, t0(), 1).unwrap();
            assert_eq!(note.level, 4);
            assert_eq!(note.due_at, Some(s.compute_due_date(4, t0()).unwrap()));
        }

        #[test]
        fn level_zero_still_resets_timer() {
            let s = Scheduler::default();
            let mut note = due_note(0);
            s.level_down(&mut note, t0(), 1).unwrap();
            assert_eq!(note.level, 0);
            assert_eq!(note.due_at, Some(s.compute_due_date(0, t0()).unwrap()));
            assert!(note.due_at.unwrap() > t0());
        }

        #[test]
        fn never_burns() {
            let s = Scheduler::default();
            let mut note = due_note(7);
            s.level_down(&mut note, t0(), 1).unwrap();
            assert!(note.level < s.max_level());
            assert!(note.burned_at.is_none());
        }

        #[test]
        fn zero_mistakes_is_invalid_argument() {
            let s = Scheduler::default();
            let mut note = due_note(3);
            let before = note.clone();
            assert!(matches!(
                s.level_down(&mut note, t0(), 0),
                Err(ScheduleError::InvalidArgument(_))
            ));
            assert_eq!(note, before);
        }

        #[test]
        fn not_yet_due_is_rejected_untouched() {
            let s = Scheduler::default();
            let mut note = note_at(5, Some(t0() + days(2)));
            let before = note.clone();
            assert_eq!(
                s.level_down(&mut note, t0(), 1),
                Err(ScheduleError::NotReviewable)
            );
            assert_eq!(note, before);
        }

        #[test]
        fn burned_note_is_rejected_untouched() {
            let s = Scheduler::default();
            let mut note = note_at(8, None);
            note.burned_at = Some(t0() - days(3));
            let before = note.clone();
            assert_eq!(
                s.level_down(&mut note, t0(), 1),
                Err(ScheduleError::NotReviewable)
            );
            assert_eq!(note, before);
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn correct_reviews_burn_a_note() {
            let s = Scheduler::default();
            let payload = NewNote {
                text: "雨".into(),
                meanings: vec!["rain".into()],
                readings: vec!["あめ".into()],
                ..Default::default()
            };
            let mut note = s.new_note(1, payload, t0()).unwrap();
            assert_eq!(note.due_at, Some(s.compute_due_date(0, t0()).unwrap()));

            let mut now = t0();
            for expected in 1..=8u8 {
                now = note.due_at.unwrap() + Duration::minutes(5);
                s.apply(&mut note, ReviewOutcome::Correct, now).unwrap();
                assert_eq!(note.level, expected);
                if expected < 8 {
                    assert_eq!(note.due_at, Some(s.compute_due_date(expected, now).unwrap()));
                }
            }

            assert_eq!(note.level, 8);
            assert_eq!(note.burned_at, Some(now));
            assert!(note.due_at.is_none());
            assert!(!s.is_reviewable(&note, now + weeks(1000)));
            assert_eq!(
                s.apply(&mut note, ReviewOutcome::Incorrect(1), now + days(1)),
                Err(ScheduleError::NotReviewable)
            );
        }

        #[test]
        fn first_correct_review_moves_to_level_one() {
            let s = Scheduler::default();
            let mut note = s
                .new_note(
                    1,
                    NewNote {
                        text: "木".into(),
                        meanings: vec!["tree".into()],
                        readings: vec!["き".into()],
                        ..Default::default()
                    },
                    t0(),
                )
                .unwrap();
            let t1 = note.due_at.unwrap() + Duration::seconds(1);
            s.level_up(&mut note, t1).unwrap();
            assert_eq!(note.level, 1);
            assert_eq!(note.due_at, Some(s.compute_due_date(1, t1).unwrap()));
        }
    }
}
