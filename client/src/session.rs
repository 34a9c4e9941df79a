//! Full-screen chat session over the relay WebSocket.

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use futures_util::{SinkExt, StreamExt};
use ratatui::DefaultTerminal;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::app::{Action, App, ConnectionStatus};
use crate::ui;
use salsa_server::ws::protocol::ServerFrame;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How often the terminal reader thread checks whether the session ended.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Turns server frames into display lines for one user.
pub struct Renderer {
    me: String,
    admitted: bool,
}

impl Renderer {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            admitted: false,
        }
    }

    /// Whether our own admission frame has arrived.
    pub fn admitted(&self) -> bool {
        self.admitted
    }

    /// Display line for `frame`, or `None` when nothing should be shown.
    ///
    /// The relay echoes our own chat messages back; the typed line is already
    /// in the chat pane, so the echo is skipped.
    pub fn render(&mut self, frame: &ServerFrame, time: &str) -> Option<String> {
        match frame {
            ServerFrame::Auth { username } if !self.admitted && *username == self.me => {
                self.admitted = true;
                Some(format!("[{time}] Connected as {username}"))
            }
            ServerFrame::Auth { username } => Some(format!("[{time}] * {username} joined")),
            ServerFrame::Chat { user, .. } if *user == self.me => None,
            ServerFrame::Chat { user, text } => Some(format!("[{time}] {user}: {text}")),
        }
    }
}

fn now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Connect to `url` and run the chat screen until the user quits.
///
/// The connection is made before the terminal switches to the alternate
/// screen so a rejected credential is reported on the normal terminal.
pub async fn run(url: &str, username: &str) -> Result<()> {
    let (ws, _) = match tokio_tungstenite::connect_async(url).await {
        Ok(ok) => ok,
        Err(tungstenite::Error::Http(response)) if response.status() == 401 => {
            bail!("server rejected the credential for {username:?}; run `salsa token {username}`")
        }
        Err(e) => return Err(e).context("can't connect to the chat server"),
    };

    let mut terminal = ratatui::try_init().context("can't set up the terminal")?;
    let result = chat(&mut terminal, ws, username).await;
    ratatui::restore();
    result
}

async fn chat(terminal: &mut DefaultTerminal, ws: WsStream, username: &str) -> Result<()> {
    let (mut write, mut read) = ws.split();
    let mut app = App::new(username);
    let mut renderer = Renderer::new(username);
    let mut terminal_events = spawn_terminal_reader();

    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        tokio::select! {
            msg = read.next(), if app.status != ConnectionStatus::Disconnected => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(frame) => {
                        if let Some(line) = renderer.render(&frame, &now()) {
                            app.push(line);
                        }
                        if renderer.admitted() {
                            app.status = ConnectionStatus::Connected;
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Ignoring unknown frame"),
                },
                Some(Ok(Message::Close(_))) | None => disconnected(&mut app),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Connection error");
                    disconnected(&mut app);
                }
            },
            ev = terminal_events.recv() => match ev {
                Some(Event::Key(key)) if key.kind == KeyEventKind::Press => match app.handle_key(key) {
                    Some(Action::Quit) => break,
                    Some(Action::Send(_)) if app.status == ConnectionStatus::Disconnected => {
                        app.push(format!("[{}] Not connected, message not sent", now()));
                    }
                    Some(Action::Send(text)) => {
                        if write.send(Message::Text(text.clone().into())).await.is_err() {
                            disconnected(&mut app);
                        } else {
                            app.push(format!("[{}] You: {text}", now()));
                        }
                    }
                    None => {}
                },
                // Resize and other events only need a redraw
                Some(_) => {}
                None => break,
            },
        }
    }

    if app.status != ConnectionStatus::Disconnected {
        let _ = write.send(Message::Close(None)).await;
    }
    Ok(())
}

fn disconnected(app: &mut App) {
    app.status = ConnectionStatus::Disconnected;
    app.push(format!("[{}] Disconnected from server.", now()));
}

/// Forward terminal events from a blocking reader thread. The thread exits
/// once the receiver is dropped.
fn spawn_terminal_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Terminal read failed");
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Terminal poll failed");
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_own_auth_is_admission() {
        let mut r = Renderer::new("alice");
        assert_eq!(
            r.render(&ServerFrame::auth("alice"), "10:00:00").as_deref(),
            Some("[10:00:00] Connected as alice")
        );
        // A second session under the same name is a join
        assert_eq!(
            r.render(&ServerFrame::auth("alice"), "10:00:01").as_deref(),
            Some("[10:00:01] * alice joined")
        );
    }

    #[test]
    fn test_peer_join_and_chat() {
        let mut r = Renderer::new("alice");
        assert_eq!(
            r.render(&ServerFrame::auth("bob"), "10:00:00").as_deref(),
            Some("[10:00:00] * bob joined")
        );
        assert_eq!(
            r.render(&ServerFrame::chat("bob", "hi"), "10:00:02").as_deref(),
            Some("[10:00:02] bob: hi")
        );
    }

    #[test]
    fn test_admission_tracked_once() {
        let mut r = Renderer::new("alice");
        assert!(!r.admitted());
        r.render(&ServerFrame::auth("bob"), "10:00:00");
        assert!(!r.admitted());
        r.render(&ServerFrame::auth("alice"), "10:00:01");
        assert!(r.admitted());
    }

    #[test]
    fn test_own_echo_is_skipped() {
        let mut r = Renderer::new("alice");
        assert_eq!(r.render(&ServerFrame::chat("alice", "hi"), "10:00:00"), None);
    }
}
