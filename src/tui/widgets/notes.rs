use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{format_due, level_bar, truncate};
use crate::models::{level_label, NoteType};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.filter_text.is_empty() {
        format!(" Notes ({}) ", app.notes.items.len())
    } else {
        format!(
            " Notes ({}) filter: {} ",
            app.notes.items.len(),
            app.filter_text
        )
    };
    let max_level = app.max_level();

    let items: Vec<ListItem> = app
        .notes
        .items
        .iter()
        .map(|note| {
            let type_color = match note.note_type {
                NoteType::Word => Color::Cyan,
                NoteType::Kanji => Color::Magenta,
            };
            let due_color = match note.due_at {
                None => Color::Green,
                Some(due) if due < app.now => Color::Red,
                Some(_) => Color::White,
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<20}", truncate(&note.text, 18)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<7}", note.note_type.as_str()),
                    Style::default().fg(type_color),
                ),
                Span::styled(
                    level_bar(note.level, max_level),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!(" {:<15}", level_label(note.level)),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(format_due(note, app.now), Style::default().fg(due_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<20}", "Text"), header_style),
        Span::styled(format!("{:<7}", "Type"), header_style),
        Span::styled(
            format!("{:<width$}", "Level", width = max_level as usize + 16),
            header_style,
        ),
        Span::styled("Due", header_style),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.notes.selected);

    // Header sits on the first row inside the border
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
