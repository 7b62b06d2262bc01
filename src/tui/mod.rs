mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::db::Database;
use crate::error::Result;
use crate::models::{level_label, Note, ReviewOutcome, User};
use crate::query::{build_filter, NoteQuery};
use crate::stats::UserStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Notes,
    NoteDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Notes,
            View::Notes => View::Dashboard,
            View::NoteDetail => View::Notes,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Notes,
            View::Notes => View::Dashboard,
            View::NoteDetail => View::Notes,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    db: Database,
    pub user: User,
    pub view: View,
    pub now: DateTime<Utc>,
    pub stats: UserStats,
    pub notes: StatefulList<Note>,
    pub selected_note: Option<Note>,
    pub query: NoteQuery,
    pub filter_text: String,
    pub filter_input: String,
    pub filter_mode: bool,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database, user: User) -> Result<Self> {
        let now = Utc::now();
        let stats = db.get_stats(user.id, now)?;
        let notes = db.list_notes(user.id, &Default::default())?;

        Ok(Self {
            db,
            user,
            view: View::Dashboard,
            now,
            stats,
            notes: StatefulList::with_items(notes),
            selected_note: None,
            query: NoteQuery::default(),
            filter_text: String::new(),
            filter_input: String::new(),
            filter_mode: false,
            status: None,
            should_quit: false,
        })
    }

    pub fn max_level(&self) -> u8 {
        self.db.scheduler().max_level()
    }

    pub fn refresh_data(&mut self) -> Result<()> {
        self.now = Utc::now();
        self.stats = self.db.get_stats(self.user.id, self.now)?;
        self.reload_notes()?;
        if let Some(id) = self.selected_note.as_ref().map(|n| n.id) {
            self.selected_note = self.db.get_note(id)?;
        }
        Ok(())
    }

    fn reload_notes(&mut self) -> Result<()> {
        let filter = build_filter(&self.query, self.now);
        let previous = self.notes.selected;
        self.notes = StatefulList::with_items(self.db.list_notes(self.user.id, &filter)?);
        if let Some(i) = previous {
            if i < self.notes.items.len() {
                self.notes.selected = Some(i);
            }
        }
        Ok(())
    }

    fn apply_filter(&mut self) -> Result<()> {
        match self.filter_input.parse::<NoteQuery>() {
            Ok(query) => {
                self.query = query;
                self.filter_text = self.filter_input.trim().to_string();
                self.status = None;
                self.notes.selected = None;
                self.reload_notes()
            }
            Err(e) => {
                self.status = Some(e.to_string());
                Ok(())
            }
        }
    }

    fn clear_filter(&mut self) -> Result<()> {
        self.query = NoteQuery::default();
        self.filter_text.clear();
        self.filter_input.clear();
        self.reload_notes()
    }

    fn select_note(&mut self) {
        if let Some(note) = self.notes.selected_item() {
            self.selected_note = Some(note.clone());
            self.view = View::NoteDetail;
        }
    }

    fn review_selected(&mut self, outcome: ReviewOutcome) -> Result<()> {
        let Some(id) = self.selected_note.as_ref().map(|n| n.id) else {
            return Ok(());
        };

        self.now = Utc::now();
        match self.db.update_progress(self.user.id, id, outcome, self.now) {
            Ok(update) => {
                self.status = Some(if update.burned {
                    "Correct, note burned".to_string()
                } else {
                    format!(
                        "{}, now level {} ({})",
                        if outcome == ReviewOutcome::Correct {
                            "Correct"
                        } else {
                            "Incorrect"
                        },
                        update.level,
                        level_label(update.level)
                    )
                });
            }
            Err(e) if e.is_client_error() => {
                self.status = Some(e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.refresh_data()
    }

    fn back_to_notes(&mut self) {
        self.view = View::Notes;
        self.selected_note = None;
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if self.filter_mode {
            match key {
                KeyCode::Esc => {
                    self.filter_mode = false;
                    self.filter_input.clear();
                }
                KeyCode::Enter => {
                    self.filter_mode = false;
                    self.apply_filter()?;
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                }
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                }
                _ => {}
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Char('/') if self.view == View::Notes => {
                self.filter_mode = true;
                self.filter_input = self.filter_text.clone();
            }

            KeyCode::Esc => match self.view {
                View::NoteDetail => self.back_to_notes(),
                View::Notes if !self.filter_text.is_empty() => self.clear_filter()?,
                View::Notes | View::Dashboard => self.status = None,
            },

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::NoteDetail => self.back_to_notes(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Notes => self.select_note(),
                View::NoteDetail => {}
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down if self.view == View::Notes => self.notes.next(),
            KeyCode::Char('k') | KeyCode::Up if self.view == View::Notes => self.notes.previous(),
            KeyCode::Char('g') if self.view == View::Notes => self.notes.first(),
            KeyCode::Char('G') if self.view == View::Notes => self.notes.last(),
            KeyCode::Enter if self.view == View::Notes => self.select_note(),

            KeyCode::Char('y') if self.view == View::NoteDetail => {
                self.review_selected(ReviewOutcome::Correct)?;
            }
            KeyCode::Char('n') if self.view == View::NoteDetail => {
                self.review_selected(ReviewOutcome::Incorrect(1))?;
            }

            _ => {}
        }
        Ok(())
    }
}

pub fn run(db: Database, user: User) -> Result<()> {
    // Load state before touching the terminal so errors print normally.
    let mut app = App::new(db, user)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
