use chrono::Duration;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::level_bar;
use crate::models::level_label;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(11), // Counters + levels row
            Constraint::Min(0),     // Upcoming reviews
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    draw_counters(f, app, top_chunks[0]);
    draw_levels(f, app, top_chunks[1]);
    draw_upcoming(f, app, chunks[1]);
}

fn draw_counters(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;
    let active = stats.notes - stats.burned_notes;

    let text = vec![
        Line::from(vec![
            Span::styled("User: ", Style::default().fg(Color::Gray)),
            Span::styled(&app.user.name, Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Notes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.notes),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Active: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", active), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Due: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.due_notes),
                Style::default().fg(if stats.due_notes > 0 {
                    Color::Yellow
                } else {
                    Color::White
                }),
            ),
        ]),
        Line::from(vec![
            Span::styled("Burned: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.burned_notes),
                Style::default().fg(Color::Green),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_levels(f: &mut Frame, app: &App, area: Rect) {
    let max_level = app.max_level();

    let items: Vec<ListItem> = app
        .stats
        .notes_per_level
        .iter()
        .enumerate()
        .map(|(level, count)| {
            let level = level as u8;
            let color = if level >= max_level {
                Color::Green
            } else if level == 0 {
                Color::Red
            } else {
                Color::Yellow
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<15}", level_label(level)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(level_bar(level, max_level), Style::default().fg(color)),
                Span::styled(format!(" {}", count), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Notes per Level ")
        .title_style(Style::default().fg(Color::Yellow));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_upcoming(f: &mut Frame, app: &App, area: Rect) {
    let labels: Vec<String> = (0..app.stats.due_per_day().len())
        .map(|day| (app.now + Duration::days(day as i64)).format("%a").to_string())
        .collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .map(String::as_str)
        .zip(app.stats.due_per_day().into_iter().map(u64::from))
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Reviews in the Next 7 Days ")
        .title_style(Style::default().fg(Color::Magenta));

    let chart = BarChart::default()
        .block(block)
        .data(data.as_slice())
        .bar_width(7)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )
        .label_style(Style::default().fg(Color::Gray));

    f.render_widget(chart, area);
}
