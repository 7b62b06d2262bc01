use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{dashboard, note_detail, notes};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Dashboard", "Notes"];
    let selected = match app.view {
        View::Dashboard => 0,
        View::Notes | View::NoteDetail => 1,
    };

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Noritori ({}) ", app.user.name)),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Notes => notes::draw(f, app, area),
        View::NoteDetail => note_detail::draw(f, app, area),
    }
}

/// Key hints for the current view, as `(keys, action)` pairs.
fn bindings(app: &App) -> Vec<(&'static str, &'static str)> {
    if app.filter_mode {
        return vec![("<CR>", "Apply"), ("<Esc>", "Cancel")];
    }

    let mut hints = vec![("h/l", "Views")];
    match app.view {
        View::Dashboard => hints.push(("^r", "Refresh")),
        View::Notes => {
            hints.extend([
                ("j/k", "Nav"),
                ("g/G", "Top/Bot"),
                ("l/<CR>", "Open"),
                ("/", "Filter"),
            ]);
            if !app.filter_text.is_empty() {
                hints.push(("<Esc>", "Clear"));
            }
        }
        View::NoteDetail => hints.extend([
            ("y", "Correct"),
            ("n", "Incorrect"),
            ("h/<Esc>", "Back"),
        ]),
    }
    hints.push(("q", "Quit"));
    hints
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let accent = Style::default().fg(Color::Yellow);
    let mut spans = Vec::new();

    if app.filter_mode {
        spans.push(Span::styled("/", accent));
        spans.push(Span::raw(app.filter_input.as_str()));
        spans.push(Span::styled("█ ", accent));
    }

    for (i, (keys, action)) in bindings(app).into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(keys, Style::default().fg(Color::Cyan)));
        spans.push(Span::raw(format!(" {}", action)));
    }

    if let Some(status) = &app.status {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(status.as_str(), accent));
    }

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;

    fn setup_app() -> App {
        let db = Database::open(":memory:").unwrap();
        db.init().unwrap();
        let user = db.create_user("hana", Utc::now()).unwrap();
        App::new(db, user).unwrap()
    }

    fn keys(app: &App) -> Vec<&'static str> {
        bindings(app).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn every_view_offers_switching_and_quit() {
        let mut app = setup_app();
        for view in [View::Dashboard, View::Notes, View::NoteDetail] {
            app.view = view;
            let keys = keys(&app);
            assert_eq!(keys.first(), Some(&"h/l"));
            assert_eq!(keys.last(), Some(&"q"));
        }
    }

    #[test]
    fn clear_hint_only_with_active_filter() {
        let mut app = setup_app();
        app.view = View::Notes;
        assert!(!keys(&app).contains(&"<Esc>"));

        app.filter_text = "due".to_string();
        assert!(keys(&app).contains(&"<Esc>"));
    }

    #[test]
    fn filter_prompt_replaces_view_hints() {
        let mut app = setup_app();
        app.view = View::Notes;
        app.filter_mode = true;
        assert_eq!(
            bindings(&app),
            vec![("<CR>", "Apply"), ("<Esc>", "Cancel")]
        );
    }

    #[test]
    fn detail_view_lists_review_keys() {
        let mut app = setup_app();
        app.view = View::NoteDetail;
        let keys = keys(&app);
        assert!(keys.contains(&"y"));
        assert!(keys.contains(&"n"));
    }
}
