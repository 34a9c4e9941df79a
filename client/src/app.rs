//! Chat screen state: scrollback, input line and connection status.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::VecDeque;
use std::fmt;

/// Maximum lines kept in the scrollback.
const MAX_LINES: usize = 1000;

/// Lines moved by PageUp/PageDown (and `b`/space).
const PAGE: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// What the session loop should do after a key press.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Send(String),
    Quit,
}

pub struct App {
    pub username: String,
    pub lines: VecDeque<String>,
    /// Lines scrolled up from the bottom; 0 follows new output.
    pub scroll: u16,
    pub input: String,
    pub status: ConnectionStatus,
}

impl App {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            lines: VecDeque::new(),
            scroll: 0,
            input: String::new(),
            status: ConnectionStatus::Connecting,
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        if self.lines.len() > MAX_LINES {
            self.lines.pop_front();
        }
        // Jump back to the newest line, like the pane did before scrolling
        self.scroll = 0;
    }

    fn max_scroll(&self) -> u16 {
        u16::try_from(self.lines.len().saturating_sub(1)).unwrap_or(u16::MAX)
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_add(n).min(self.max_scroll());
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = self.max_scroll();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    /// Apply a key press.
    ///
    /// The input line always has focus. Arrow and page keys scroll at any
    /// time; the vi-style keys (`j k g G b space q`) only act as commands
    /// while the input line is empty, otherwise they are typed.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Char('c') if ctrl => return Some(Action::Quit),
            KeyCode::Enter => return self.submit(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Up => self.scroll_up(1),
            KeyCode::Down => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(PAGE),
            KeyCode::PageDown => self.scroll_down(PAGE),
            KeyCode::Home => self.scroll_to_top(),
            KeyCode::End => self.scroll_to_bottom(),
            KeyCode::Char(c) if self.input.is_empty() && is_command_key(c) => match c {
                'k' => self.scroll_up(1),
                'j' => self.scroll_down(1),
                'b' => self.scroll_up(PAGE),
                ' ' => self.scroll_down(PAGE),
                'g' => self.scroll_to_top(),
                'G' => self.scroll_to_bottom(),
                _ => return Some(Action::Quit),
            },
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.input.push(c);
            }
            _ => {}
        }
        None
    }

    fn submit(&mut self) -> Option<Action> {
        let line = std::mem::take(&mut self.input);
        match line.trim() {
            "" => None,
            "/quit" => Some(Action::Quit),
            text => Some(Action::Send(text.to_string())),
        }
    }
}

fn is_command_key(c: char) -> bool {
    matches!(c, 'j' | 'k' | 'g' | 'G' | 'b' | ' ' | 'q')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(app: &mut App, code: KeyCode) -> Option<Action> {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn filled(n: usize) -> App {
        let mut app = App::new("alice");
        for i in 0..n {
            app.push(format!("line {i}"));
        }
        app
    }

    #[test]
    fn test_push_caps_scrollback_and_follows_bottom() {
        let mut app = filled(MAX_LINES);
        app.scroll_up(10);
        app.push("newest".into());

        assert_eq!(app.lines.len(), MAX_LINES);
        assert_eq!(app.lines.front().map(String::as_str), Some("line 1"));
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut app = filled(10);
        app.scroll_up(100);
        assert_eq!(app.scroll, 9);
        app.scroll_down(3);
        assert_eq!(app.scroll, 6);
        app.scroll_down(100);
        assert_eq!(app.scroll, 0);

        let mut empty = App::new("alice");
        empty.scroll_up(5);
        assert_eq!(empty.scroll, 0);
    }

    #[test]
    fn test_navigation_keys() {
        let mut app = filled(20);
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Up);
        assert_eq!(app.scroll, 2);
        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.scroll, 7);
        press(&mut app, KeyCode::PageDown);
        assert_eq!(app.scroll, 2);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.scroll, 1);
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.scroll, 19);
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.scroll, 0);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_command_keys_are_typed_mid_line() {
        let mut app = filled(20);
        type_str(&mut app, "hey jo q");
        assert_eq!(app.input, "hey jo q");
        assert_eq!(app.scroll, 0);

        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input, "hey jo ");
    }

    #[test]
    fn test_enter_submits_trimmed_line() {
        let mut app = App::new("alice");
        // The leading space scrolls instead of being typed
        type_str(&mut app, " hi  there ");
        assert_eq!(app.input, "hi  there ");
        assert_eq!(press(&mut app, KeyCode::Enter), Some(Action::Send("hi  there".into())));
        assert!(app.input.is_empty());

        type_str(&mut app, "a");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(press(&mut app, KeyCode::Enter), None);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::new("alice");
        assert_eq!(press(&mut app, KeyCode::Esc), Some(Action::Quit));
        assert_eq!(press(&mut app, KeyCode::Char('q')), Some(Action::Quit));
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );

        type_str(&mut app, "/quit");
        assert_eq!(press(&mut app, KeyCode::Enter), Some(Action::Quit));
    }
}
