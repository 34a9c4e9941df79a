use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

/// Frames the server sends to clients, JSON encoded in text messages.
///
/// Clients send raw text (the message body, no envelope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Admission acknowledgement, and the join announcement peers receive.
    Auth { username: String },
    /// A relayed chat message.
    Chat { user: String, text: String },
}

impl ServerFrame {
    pub fn auth(username: impl Into<String>) -> Self {
        Self::Auth {
            username: username.into(),
        }
    }

    pub fn chat(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            user: user.into(),
            text: text.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Chat { .. } => "chat",
        }
    }

    /// Encode as a WebSocket text message.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Message::Text(json.into()))
    }
}

/// Normalize an inbound chat body.
///
/// Returns `None` when the body is empty after trimming or longer than
/// `max_bytes`; such messages are dropped without a reply.
pub fn normalize_body(raw: &str, max_bytes: usize) -> Option<&str> {
    let body = raw.trim();
    if body.is_empty() || body.len() > max_bytes {
        return None;
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_frame_shape() {
        let value = serde_json::to_value(ServerFrame::auth("alice")).unwrap();
        assert_eq!(value, json!({"type": "auth", "username": "alice"}));
    }

    #[test]
    fn test_chat_frame_shape() {
        let value = serde_json::to_value(ServerFrame::chat("bob", "hi")).unwrap();
        assert_eq!(value, json!({"type": "chat", "user": "bob", "text": "hi"}));
    }

    #[test]
    fn test_to_message_is_text() {
        let msg = ServerFrame::chat("bob", "hi").to_message().unwrap();
        match msg {
            Message::Text(text) => {
                assert_eq!(text.as_str(), r#"{"type":"chat","user":"bob","text":"hi"}"#)
            }
            other => panic!("Expected text message, got: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_body() {
        assert_eq!(normalize_body("  hi there \n", 64), Some("hi there"));
        assert_eq!(normalize_body("", 64), None);
        assert_eq!(normalize_body(" \t\r\n ", 64), None);
        assert_eq!(normalize_body("abcdef", 5), None);
        assert_eq!(normalize_body("  abcde  ", 5), Some("abcde"));
    }
}
