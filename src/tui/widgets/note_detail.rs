use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::level_bar;
use crate::models::{level_label, Note};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(note) = &app.selected_note else {
        let block = Block::default().borders(Borders::ALL).title(" Note ");
        let paragraph = Paragraph::new("No note selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Meanings, readings, tags
            Constraint::Length(6), // Progress
            Constraint::Min(0),    // Description, examples, notes
        ])
        .split(area);

    draw_header(f, note, chunks[0]);
    draw_progress(f, app, note, chunks[1]);
    draw_body(f, note, chunks[2]);
}

fn labelled<'a>(label: &'a str, value: String, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_header(f: &mut Frame, note: &Note, area: Rect) {
    let tags = if note.tags.is_empty() {
        "None".to_string()
    } else {
        note.tags.join(", ")
    };

    let text = vec![
        labelled("Type: ", note.note_type.as_str().to_string(), Color::Magenta),
        labelled("Meanings: ", note.meanings.join(", "), Color::White),
        labelled("Readings: ", note.readings.join(", "), Color::White),
        Line::from(""),
        labelled("Tags: ", tags, Color::Cyan),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", note.text))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_progress(f: &mut Frame, app: &App, note: &Note, area: Rect) {
    let max_level = app.max_level();

    let schedule = match (note.due_at, note.burned_at) {
        (_, Some(burned)) => labelled(
            "Burned: ",
            burned.format("%Y-%m-%d %H:%M").to_string(),
            Color::Green,
        ),
        (Some(due), None) if due < app.now => labelled(
            "Due: ",
            format!("{} (ready, y/n to review)", due.format("%Y-%m-%d %H:%M")),
            Color::Red,
        ),
        (Some(due), None) => labelled(
            "Due: ",
            due.format("%Y-%m-%d %H:%M").to_string(),
            Color::White,
        ),
        (None, None) => labelled("Due: ", "Not set".to_string(), Color::DarkGray),
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Level: ", Style::default().fg(Color::Gray)),
            Span::styled(
                level_bar(note.level, max_level),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!(" {} ({})", note.level, level_label(note.level)),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        schedule,
        labelled(
            "Created: ",
            note.created_at.format("%Y-%m-%d").to_string(),
            Color::White,
        ),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Progress ")
        .title_style(Style::default().fg(Color::Green));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_body(f: &mut Frame, note: &Note, area: Rect) {
    let mut text = Vec::new();

    if let Some(desc) = &note.description {
        text.push(Line::from(Span::styled(
            desc.clone(),
            Style::default().fg(Color::White),
        )));
        text.push(Line::from(""));
    }

    if !note.example_sentences.is_empty() {
        text.push(Line::from(Span::styled(
            "Examples",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        )));
        for sentence in &note.example_sentences {
            text.push(Line::from(vec![
                Span::styled("  - ", Style::default().fg(Color::DarkGray)),
                Span::styled(sentence.clone(), Style::default().fg(Color::White)),
            ]));
        }
        text.push(Line::from(""));
    }

    if let Some(extra) = &note.notes {
        text.push(labelled("Notes: ", extra.clone(), Color::White));
    }

    if text.is_empty() {
        text.push(Line::from(Span::styled(
            "No description, examples or notes",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Details ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}
