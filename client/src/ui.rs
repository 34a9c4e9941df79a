//! Ratatui rendering for the chat screen.

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, ConnectionStatus};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(3),    // chat pane
            Constraint::Length(1), // status bar
            Constraint::Length(3), // input
        ])
        .split(frame.area());

    draw_header(frame, chunks[0]);
    draw_messages(frame, app, chunks[1]);
    draw_status_bar(frame, app, chunks[2]);
    draw_input(frame, app, chunks[3]);
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let header = Paragraph::new("Salsa Chat - Real-time messaging")
        .alignment(Alignment::Center)
        .style(Style::default().bg(Color::Blue).fg(Color::White));
    frame.render_widget(header, area);
}

fn draw_messages(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.scroll > 0 {
        format!(" chat (+{} below) ", app.scroll)
    } else {
        " chat ".to_string()
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Window of lines ending `scroll` lines above the newest
    let end = app.lines.len().saturating_sub(app.scroll as usize);
    let start = end.saturating_sub(inner.height as usize);
    let visible: Vec<Line> = app
        .lines
        .range(start..end)
        .map(|line| Line::from(line.as_str()))
        .collect();

    frame.render_widget(Paragraph::new(visible), inner);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (text, bg) = match app.status {
        ConnectionStatus::Connected => (format!(" Status: Connected as {}", app.username), Color::Green),
        ConnectionStatus::Connecting => (" Status: Connecting...".to_string(), Color::Yellow),
        ConnectionStatus::Disconnected => {
            (" Status: Disconnected (Esc to quit)".to_string(), Color::Red)
        }
    };
    let status = Paragraph::new(text).style(Style::default().bg(bg).fg(Color::White));
    frame.render_widget(status, area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let input = Paragraph::new(app.input.as_str())
        .block(Block::default().borders(Borders::ALL).title(" message "));
    frame.render_widget(input, area);

    let typed = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
    let x = area.x.saturating_add(1).saturating_add(typed);
    let max_x = area.x + area.width.saturating_sub(2);
    frame.set_cursor_position(Position::new(x.min(max_x), area.y + 1));
}
