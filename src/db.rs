use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, info, warn};
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{
    validate_user_name, NewNote, Note, NoteType, ProgressUpdate, ReviewOutcome, Tag, User,
};
use crate::query::{LevelFilter, NoteFilter};
use crate::schedule::{IntervalTable, Scheduler};
use crate::stats::{self, StatsInput, UserStats};

const NOTE_COLUMNS: &str = "id, creator_id, text, meanings, readings, description, \
    example_sentences, notes, tags, note_type, level, due_at, burned_at, created_at, revision";

pub struct Database {
    conn: Connection,
    scheduler: Scheduler,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_scheduler(path, Scheduler::new(IntervalTable::standard()))
    }

    pub fn with_scheduler<P: AsRef<Path>>(path: P, scheduler: Scheduler) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, scheduler })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );

            -- List columns hold JSON arrays; instants are Unix milliseconds.
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                creator_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                meanings TEXT NOT NULL,
                readings TEXT NOT NULL,
                description TEXT,
                example_sentences TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                note_type TEXT NOT NULL DEFAULT 'word' CHECK(note_type IN ('word', 'kanji')),
                level INTEGER NOT NULL DEFAULT 0 CHECK(level >= 0),
                due_at INTEGER,
                burned_at INTEGER,
                created_at INTEGER NOT NULL,
                revision INTEGER NOT NULL DEFAULT 0,
                CHECK ((due_at IS NULL) <> (burned_at IS NULL)),
                FOREIGN KEY (creator_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_notes_creator ON notes(creator_id);
            CREATE INDEX IF NOT EXISTS idx_notes_due_at ON notes(due_at);
            CREATE INDEX IF NOT EXISTS idx_notes_level ON notes(level);
            "#,
        )?;
        Ok(())
    }

    // User operations
    pub fn create_user(&self, name: &str, now: DateTime<Utc>) -> Result<User> {
        let name = name.trim();
        validate_user_name(name)?;
        let now = now.trunc_subsecs(3);

        let inserted = self.conn.execute(
            "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
            params![name, now.timestamp_millis()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(Error::Validation(format!("user '{}' already exists", name)));
            }
            Err(e) => return Err(e.into()),
        }

        let id = self.conn.last_insert_rowid();
        info!("created user {} ({})", id, name);
        Ok(User {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE name = ?1",
                params![name.trim()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // Note operations
    pub fn add_note(&self, creator_id: i64, payload: NewNote, now: DateTime<Utc>) -> Result<Note> {
        payload.validate()?;
        // Stored instants have millisecond precision; schedule from the same value.
        let now = now.trunc_subsecs(3);
        let mut note = self.scheduler.new_note(creator_id, payload, now)?;

        self.conn.execute(
            r#"
            INSERT INTO notes (creator_id, text, meanings, readings, description,
                               example_sentences, notes, tags, note_type, level,
                               due_at, burned_at, created_at, revision)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                note.creator_id,
                note.text,
                serde_json::to_string(&note.meanings)?,
                serde_json::to_string(&note.readings)?,
                note.description,
                serde_json::to_string(&note.example_sentences)?,
                note.notes,
                serde_json::to_string(&note.tags)?,
                note.note_type.as_str(),
                note.level,
                note.due_at.map(|t| t.timestamp_millis()),
                note.burned_at.map(|t| t.timestamp_millis()),
                note.created_at.timestamp_millis(),
                note.revision,
            ],
        )?;
        note.id = self.conn.last_insert_rowid();

        info!("created note {} for user {}", note.id, creator_id);
        Ok(note)
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let sql = format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS);
        let note = self
            .conn
            .query_row(&sql, params![id], note_from_row)
            .optional()?;
        Ok(note)
    }

    /// Fetches a note and checks that `creator_id` owns it.
    pub fn get_owned_note(&self, creator_id: i64, id: i64) -> Result<Note> {
        let note = self
            .get_note(id)?
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
        if note.creator_id != creator_id {
            return Err(Error::Forbidden);
        }
        Ok(note)
    }

    pub fn list_notes(&self, creator_id: i64, filter: &NoteFilter) -> Result<Vec<Note>> {
        let (clause, mut params_vec) = filter_clause(filter);
        params_vec.insert(0, Box::new(creator_id));

        let query = format!(
            "SELECT {} FROM notes WHERE creator_id = ?{} ORDER BY due_at IS NULL, due_at, id",
            NOTE_COLUMNS, clause
        );
        if filter.is_empty() {
            debug!("listing all notes for user {}", creator_id);
        } else {
            debug!("listing notes for user {}: {:?}", creator_id, filter);
        }

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), note_from_row)?;
        let notes = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    /// Persists schedule and content changes. The update only applies when the
    /// stored revision still matches `note.revision`, so two reviews racing on
    /// the same note cannot overwrite each other.
    pub fn save_note(&self, note: &mut Note) -> Result<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE notes
            SET text = ?1,
                meanings = ?2,
                readings = ?3,
                description = ?4,
                example_sentences = ?5,
                notes = ?6,
                tags = ?7,
                level = ?8,
                due_at = ?9,
                burned_at = ?10,
                revision = revision + 1
            WHERE id = ?11 AND revision = ?12
            "#,
            params![
                note.text,
                serde_json::to_string(&note.meanings)?,
                serde_json::to_string(&note.readings)?,
                note.description,
                serde_json::to_string(&note.example_sentences)?,
                note.notes,
                serde_json::to_string(&note.tags)?,
                note.level,
                note.due_at.map(|t| t.timestamp_millis()),
                note.burned_at.map(|t| t.timestamp_millis()),
                note.id,
                note.revision,
            ],
        )?;

        if rows == 0 {
            if self.get_note(note.id)?.is_none() {
                return Err(Error::NotFound(format!("note {}", note.id)));
            }
            warn!(
                "note {} changed since revision {}, rejecting update",
                note.id, note.revision
            );
            return Err(Error::Conflict(note.id));
        }

        note.revision += 1;
        Ok(())
    }

    pub fn delete_note(&self, creator_id: i64, id: i64) -> Result<bool> {
        match self.get_owned_note(creator_id, id) {
            Ok(_) => {}
            Err(Error::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        }
        let rows = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        info!("deleted note {}", id);
        Ok(rows > 0)
    }

    pub fn update_note_tags(&self, creator_id: i64, id: i64, tags: &[String]) -> Result<Note> {
        if tags.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Validation("tags must not be empty".into()));
        }
        let mut note = self.get_owned_note(creator_id, id)?;
        note.tags = tags.to_vec();
        self.save_note(&mut note)?;
        Ok(note)
    }

    pub fn list_tags(&self, creator_id: i64) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT j.value, COUNT(*) AS note_count
            FROM notes n, json_each(n.tags) j
            WHERE n.creator_id = ?1
            GROUP BY j.value
            ORDER BY j.value
            "#,
        )?;

        let rows = stmt.query_map(params![creator_id], |row| {
            Ok(Tag {
                name: row.get(0)?,
                note_count: row.get(1)?,
            })
        })?;
        let tags = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tags)
    }

    // Review operations
    pub fn update_progress(
        &self,
        creator_id: i64,
        id: i64,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<ProgressUpdate> {
        let mut note = self.get_owned_note(creator_id, id)?;
        self.scheduler.apply(&mut note, outcome, now)?;
        self.save_note(&mut note)?;

        info!(
            "recorded {} review for note {}, now level {}",
            outcome.as_str(),
            id,
            note.level
        );

        Ok(ProgressUpdate {
            level: note.level,
            due_at: note.due_at,
            due_in: note.due_in(now),
            burned: self.scheduler.is_burned(&note),
        })
    }

    /// Notes that can be reviewed right now, soonest due first.
    pub fn reviewable_notes(&self, creator_id: i64, now: DateTime<Utc>) -> Result<Vec<Note>> {
        let filter = NoteFilter {
            due_before: Some(now),
            ..Default::default()
        };
        let notes = self
            .list_notes(creator_id, &filter)?
            .into_iter()
            .filter(|n| self.scheduler.is_reviewable(n, now))
            .collect();
        Ok(notes)
    }

    // Statistics
    pub fn stats_input(&self, creator_id: i64, now: DateTime<Utc>) -> Result<StatsInput> {
        let now_ms = now.timestamp_millis();

        let notes: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE creator_id = ?1",
            params![creator_id],
            |row| row.get(0),
        )?;

        let due_notes: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE creator_id = ?1 AND due_at <= ?2 AND burned_at IS NULL",
            params![creator_id, now_ms],
            |row| row.get(0),
        )?;

        let burned_notes: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE creator_id = ?1 AND burned_at IS NOT NULL",
            params![creator_id],
            |row| row.get(0),
        )?;

        let week_filter = NoteFilter {
            due_before: Some(now + stats::timeline_window()),
            ..Default::default()
        };
        let due_within_week = self
            .list_notes(creator_id, &week_filter)?
            .into_iter()
            .filter(|n| n.burned_at.is_none())
            .collect();

        let mut notes_per_level = vec![0i64; self.scheduler.max_level() as usize + 1];
        let mut stmt = self.conn.prepare(
            "SELECT level, COUNT(*) FROM notes WHERE creator_id = ?1 GROUP BY level",
        )?;
        let rows = stmt.query_map(params![creator_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (level, count) = row?;
            if let Some(slot) = usize::try_from(level)
                .ok()
                .and_then(|l| notes_per_level.get_mut(l))
            {
                *slot = count;
            }
        }

        Ok(StatsInput {
            notes,
            due_notes,
            burned_notes,
            due_within_week,
            notes_per_level,
        })
    }

    pub fn get_stats(&self, creator_id: i64, now: DateTime<Utc>) -> Result<UserStats> {
        let input = self.stats_input(creator_id, now)?;
        Ok(stats::aggregate(input, self.scheduler.max_level(), now))
    }
}

fn filter_clause(filter: &NoteFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clause = String::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    match filter.level {
        Some(LevelFilter::Exact(level)) => {
            clause.push_str(" AND level = ?");
            params_vec.push(Box::new(level));
        }
        Some(LevelFilter::Between { min, max }) => {
            clause.push_str(" AND level >= ? AND level <= ?");
            params_vec.push(Box::new(min));
            params_vec.push(Box::new(max));
        }
        Some(LevelFilter::AtLeast(min)) => {
            clause.push_str(" AND level >= ?");
            params_vec.push(Box::new(min));
        }
        Some(LevelFilter::AtMost(max)) => {
            clause.push_str(" AND level <= ?");
            params_vec.push(Box::new(max));
        }
        None => {}
    }

    if let Some(note_type) = filter.note_type {
        clause.push_str(" AND note_type = ?");
        params_vec.push(Box::new(note_type.as_str()));
    }

    if filter.burned {
        clause.push_str(" AND burned_at IS NOT NULL");
    }

    if let Some(threshold) = filter.due_before {
        clause.push_str(" AND due_at <= ?");
        params_vec.push(Box::new(threshold.timestamp_millis()));
    }

    (clause, params_vec)
}

fn from_millis(ms: i64, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(ms)),
        )
    })
}

fn optional_millis(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|ms| from_millis(ms, idx))
        .transpose()
}

fn json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: from_millis(row.get(2)?, 2)?,
    })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    let type_str: String = row.get(9)?;
    let note_type = NoteType::from_str(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            Type::Text,
            format!("unknown note type '{}'", type_str).into(),
        )
    })?;

    Ok(Note {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        text: row.get(2)?,
        meanings: json_list(row, 3)?,
        readings: json_list(row, 4)?,
        description: row.get(5)?,
        example_sentences: json_list(row, 6)?,
        notes: row.get(7)?,
        tags: json_list(row, 8)?,
        note_type,
        level: row.get(10)?,
        due_at: optional_millis(row, 11)?,
        burned_at: optional_millis(row, 12)?,
        created_at: from_millis(row.get(13)?, 13)?,
        revision: row.get(14)?,
    })
}
