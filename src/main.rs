mod config;
mod db;
mod error;
mod models;
mod query;
mod schedule;
mod stats;
mod tui;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::debug;
use rand::seq::SliceRandom;
use serde::Serialize;

use config::Config;
use db::Database;
use error::{Error, Result};
use models::{level_label, JsonOutput, NewNote, Note, NoteType, ReviewOutcome, User};
use query::{build_filter, NoteQuery};

#[derive(Parser)]
#[command(name = "noritori")]
#[command(about = "A spaced-repetition trainer for Japanese vocabulary and kanji")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (defaults to NORITORI_USER or the config file)
    #[arg(long, short, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Manage notes
    #[command(subcommand)]
    Note(NoteCommands),

    /// List all tags with note counts
    Tags,

    /// Show review statistics
    Stats {
        /// Also print the hourly due timeline for the next week
        #[arg(long)]
        timeline: bool,
    },

    /// Pick a random note that is ready for review
    Next,

    /// Record a review: 1 for correct, -N for N incorrect attempts
    Review {
        /// Note ID
        id: i64,

        /// Review amount
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a new user
    Add {
        /// User name (3 to 30 characters)
        name: String,
    },

    /// Show the current user
    Me,
}

#[derive(Subcommand)]
enum NoteCommands {
    /// List notes, optionally filtered
    List {
        /// Exact level
        #[arg(long)]
        level: Option<u8>,

        /// Minimum level (inclusive)
        #[arg(long)]
        level_gt: Option<u8>,

        /// Maximum level (inclusive)
        #[arg(long)]
        level_lt: Option<u8>,

        /// Note type: word or kanji
        #[arg(long = "type", value_parser = parse_note_type)]
        note_type: Option<NoteType>,

        /// Only burned notes
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        burned: Option<bool>,

        /// Only notes due now
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        due: Option<bool>,

        /// Only notes due at or before this RFC 3339 instant
        #[arg(long, value_parser = parse_instant)]
        due_at: Option<DateTime<Utc>>,
    },

    /// Show note details
    Show {
        /// Note ID
        id: i64,
    },

    /// Add a new note
    Add {
        /// The word or kanji
        text: String,

        /// Meaning (repeatable)
        #[arg(long = "meaning", short = 'm', required = true)]
        meanings: Vec<String>,

        /// Reading (repeatable)
        #[arg(long = "reading", short = 'r', required = true)]
        readings: Vec<String>,

        /// Longer description
        #[arg(long, short)]
        description: Option<String>,

        /// Example sentence (repeatable)
        #[arg(long = "example", short = 'e')]
        examples: Vec<String>,

        /// Free-form notes
        #[arg(long, short)]
        notes: Option<String>,

        /// Comma-separated tags
        #[arg(long, short)]
        tags: Option<String>,

        /// Note type: word or kanji
        #[arg(long = "type", value_parser = parse_note_type, default_value = "word")]
        note_type: NoteType,
    },

    /// Delete a note
    Delete {
        /// Note ID
        id: i64,
    },

    /// Update note tags
    Tag {
        /// Note ID
        id: i64,

        /// Comma-separated tags (replaces existing)
        #[arg(long, short)]
        tags: String,
    },
}

fn parse_note_type(s: &str) -> std::result::Result<NoteType, String> {
    NoteType::from_str(s).ok_or_else(|| format!("unknown note type '{}', use word or kanji", s))
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    let json = cli.json;
    if let Err(e) = run(cli, config) {
        if json {
            if let Ok(out) = serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                println!("{}", out);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(if e.is_client_error() { 2 } else { 1 });
    }
}

fn run(cli: Cli, config: Config) -> Result<()> {
    config.ensure_database_dir()?;
    debug!("using database at {}", config.database_path.display());
    let db = Database::open(&config.database_path)?;
    let now = Utc::now();
    let user_name = cli.user.or(config.default_user);

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", config.database_path.display());
            }
        }

        Commands::User(user_cmd) => match user_cmd {
            UserCommands::Add { name } => {
                let user = db.create_user(&name, now)?;
                if cli.json {
                    print_json(&user)?;
                } else {
                    println!("Added user '{}' with ID: {}", user.name, user.id);
                }
            }

            UserCommands::Me => {
                let user = current_user(&db, user_name.as_deref())?;
                if cli.json {
                    print_json(&user)?;
                } else {
                    println!("User: {}", user.name);
                    println!("ID: {}", user.id);
                    println!("Created: {}", user.created_at);
                }
            }
        },

        Commands::Note(note_cmd) => {
            let user = current_user(&db, user_name.as_deref())?;
            run_note_command(&db, &user, note_cmd, cli.json, now)?;
        }

        Commands::Tags => {
            let user = current_user(&db, user_name.as_deref())?;
            let tags = db.list_tags(user.id)?;
            if cli.json {
                print_json(&tags)?;
            } else if tags.is_empty() {
                println!("No tags found.");
            } else {
                println!("{:<30} NOTES", "TAG");
                println!("{}", "-".repeat(40));
                for tag in tags {
                    println!("{:<30} {}", truncate(&tag.name, 28), tag.note_count);
                }
            }
        }

        Commands::Stats { timeline } => {
            let user = current_user(&db, user_name.as_deref())?;
            let stats = db.get_stats(user.id, now)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Review Statistics ===");
                println!("Total notes: {}", stats.notes);
                println!("Due for review: {}", stats.due_notes);
                println!("Burned: {}", stats.burned_notes);
                println!();
                println!("--- Notes per level ---");
                for (level, count) in stats.notes_per_level.iter().enumerate() {
                    println!("{:>2} {:<15} {}", level, level_label(level as u8), count);
                }
                println!();
                println!("--- Due in the next 7 days ---");
                for (day, count) in stats.due_per_day().iter().enumerate() {
                    println!("Day {}: {}", day + 1, count);
                }

                if timeline {
                    println!();
                    println!("--- Hourly timeline ---");
                    for (hour, levels) in stats.timeline.iter().enumerate() {
                        if levels.iter().all(|&n| n == 0) {
                            continue;
                        }
                        let cells: Vec<String> = levels
                            .iter()
                            .enumerate()
                            .filter(|&(_, &n)| n > 0)
                            .map(|(level, n)| format!("L{}:{}", level, n))
                            .collect();
                        println!("+{:>3}h  {}", hour, cells.join(" "));
                    }
                }
            }
        }

        Commands::Next => {
            let user = current_user(&db, user_name.as_deref())?;
            let candidates = db.reviewable_notes(user.id, now)?;
            let picked = candidates.choose(&mut rand::thread_rng());

            if cli.json {
                print_json(picked)?;
            } else if let Some(note) = picked {
                println!("=== Next Note to Review ({} ready) ===", candidates.len());
                println!();
                println!("{} (ID: {})", note.text, note.id);
                println!(
                    "Type: {}  Level: {} ({})",
                    note.note_type.as_str(),
                    note.level,
                    level_label(note.level)
                );
                println!();
                println!("After answering, record the outcome with:");
                println!("  noritori review {} 1     # correct", note.id);
                println!("  noritori review {} -1    # incorrect", note.id);
            } else {
                println!("Nothing to review right now.");
            }
        }

        Commands::Review { id, amount } => {
            let user = current_user(&db, user_name.as_deref())?;
            let outcome = ReviewOutcome::from_amount(amount)?;
            let update = db.update_progress(user.id, id, outcome, now)?;

            if cli.json {
                print_json(&update)?;
            } else {
                println!("Review recorded for note {} ({}).", id, outcome.as_str());
                println!("New level: {} ({})", update.level, level_label(update.level));
                match (update.burned, update.due_at, update.due_in) {
                    (true, _, _) => println!("Note burned, it will not come up again."),
                    (false, Some(due_at), Some(due_in)) => {
                        println!("Next review: {} ({})", due_at, format_due_in(due_in))
                    }
                    _ => {}
                }
            }
        }

        Commands::Tui => {
            let user = current_user(&db, user_name.as_deref())?;
            tui::run(db, user)?;
        }
    }

    Ok(())
}

fn run_note_command(
    db: &Database,
    user: &User,
    cmd: NoteCommands,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    match cmd {
        NoteCommands::List {
            level,
            level_gt,
            level_lt,
            note_type,
            burned,
            due,
            due_at,
        } => {
            let query = NoteQuery {
                level,
                level_gt,
                level_lt,
                note_type,
                burned,
                due,
                due_at,
            };
            let notes = db.list_notes(user.id, &build_filter(&query, now))?;
            if json {
                print_json(&notes)?;
            } else if notes.is_empty() {
                println!("No notes found.");
            } else {
                println!(
                    "{:<5} {:<6} {:<16} {:<24} DUE",
                    "ID", "TYPE", "LEVEL", "TEXT"
                );
                println!("{}", "-".repeat(70));
                for note in notes {
                    println!(
                        "{:<5} {:<6} {:<16} {:<24} {}",
                        note.id,
                        note.note_type.as_str(),
                        format!("{} {}", note.level, level_label(note.level)),
                        truncate(&note.text, 22),
                        describe_due(&note, now)
                    );
                }
            }
        }

        NoteCommands::Show { id } => {
            let note = db.get_owned_note(user.id, id)?;
            if json {
                print_json(&note)?;
            } else {
                print_note(&note, now);
            }
        }

        NoteCommands::Add {
            text,
            meanings,
            readings,
            description,
            examples,
            notes,
            tags,
            note_type,
        } => {
            let payload = NewNote {
                text,
                meanings,
                readings,
                description,
                example_sentences: examples,
                notes,
                tags: tags.as_deref().map(split_tags).unwrap_or_default(),
                note_type,
            };
            let note = db.add_note(user.id, payload, now)?;

            if json {
                print_json(&note)?;
            } else {
                println!("Added note '{}' with ID: {}", note.text, note.id);
                if let Some(due_in) = note.due_in(now) {
                    println!("First review {}.", format_due_in(due_in));
                }
            }
        }

        NoteCommands::Delete { id } => {
            if !db.delete_note(user.id, id)? {
                return Err(Error::NotFound(format!("note {}", id)));
            }
            if json {
                print_json(())?;
            } else {
                println!("Note {} deleted.", id);
            }
        }

        NoteCommands::Tag { id, tags } => {
            let note = db.update_note_tags(user.id, id, &split_tags(&tags))?;
            if json {
                print_json(&note)?;
            } else {
                println!("Updated tags for note {}.", id);
            }
        }
    }

    Ok(())
}

fn current_user(db: &Database, name: Option<&str>) -> Result<User> {
    let name = name.filter(|n| !n.trim().is_empty()).ok_or(Error::NoUser)?;
    db.get_user_by_name(name)?
        .ok_or_else(|| Error::NotFound(format!("user '{}'", name)))
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn print_note(note: &Note, now: DateTime<Utc>) {
    println!("Note: {}", note.text);
    println!("ID: {}", note.id);
    println!("Type: {}", note.note_type.as_str());
    println!("Meanings: {}", note.meanings.join(", "));
    println!("Readings: {}", note.readings.join(", "));
    if let Some(desc) = &note.description {
        println!("Description: {}", desc);
    }
    if !note.example_sentences.is_empty() {
        println!("Examples:");
        for sentence in &note.example_sentences {
            println!("  - {}", sentence);
        }
    }
    if let Some(extra) = &note.notes {
        println!("Notes: {}", extra);
    }
    println!(
        "Tags: {}",
        if note.tags.is_empty() {
            "-".to_string()
        } else {
            note.tags.join(", ")
        }
    );
    println!("Created: {}", note.created_at);

    println!();
    println!("--- Progress ---");
    println!("Level: {} ({})", note.level, level_label(note.level));
    if let Some(burned_at) = &note.burned_at {
        println!("Burned: {}", burned_at);
    }
    if let Some(due_at) = &note.due_at {
        println!("Next review: {} ({})", due_at, describe_due(note, now));
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn describe_due(note: &Note, now: DateTime<Utc>) -> String {
    match note.due_in(now) {
        Some(ms) => format_due_in(ms),
        None => "burned".to_string(),
    }
}

/// Human form of a signed millisecond offset, e.g. `in 3h` or `now`.
fn format_due_in(ms: i64) -> String {
    const MINUTE: i64 = 60 * 1000;
    if ms <= 0 {
        return "now".to_string();
    }
    let minutes = (ms + MINUTE - 1) / MINUTE;
    if minutes < 60 {
        format!("in {}m", minutes)
    } else if minutes < 48 * 60 {
        format!("in {}h", (minutes + 59) / 60)
    } else {
        format!("in {}d", minutes / (24 * 60))
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
