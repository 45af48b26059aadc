use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for Role {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// Creation instant of a message in milliseconds since the Unix epoch.
///
/// Doubles as the message's identity: typing state and displayed text are
/// keyed by it, so it must be unique within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageKey(pub i64);

impl MessageKey {
    pub fn now() -> Self {
        MessageKey(Utc::now().timestamp_millis())
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: MessageKey,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: MessageKey) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            image_url: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, MessageKey::now())
    }

    /// A user message carrying a photo of the medication.
    pub fn user_with_image(content: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            ..Self::user(content)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, MessageKey::now())
    }

    pub fn key(&self) -> MessageKey {
        self.timestamp
    }
}

/// Append-only transcript of one conversation.
///
/// Messages are never edited in place; animated partial text lives in
/// [`crate::core::typing::DisplayedTextMap`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut store = Self::new();
        for message in messages {
            store.push(message);
        }
        store
    }

    /// Appends a message and returns its key.
    ///
    /// Two messages created within the same millisecond would share a key,
    /// so a colliding or out-of-order timestamp is bumped past the last one.
    pub fn push(&mut self, mut message: Message) -> MessageKey {
        if let Some(last) = self.messages.last() {
            if message.timestamp <= last.timestamp {
                message.timestamp = MessageKey(last.timestamp.0 + 1);
            }
        }
        let key = message.timestamp;
        self.messages.push(message);
        key
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, key: MessageKey) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&key, |m| m.timestamp)
            .ok()
            .map(|index| &self.messages[index])
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role.is_assistant())
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a MessageStore {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_image_url() {
        let message = Message {
            image_url: Some("https://img.example/pill.jpg".into()),
            ..Message::new(Role::User, "What is this?", MessageKey(1000))
        };
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["role"], "user");
        assert_eq!(json["timestamp"], 1000);
        assert_eq!(json["imageUrl"], "https://img.example/pill.jpg");
    }

    #[test]
    fn omits_missing_image_url() {
        let message = Message::new(Role::Assistant, "Hi", MessageKey(5));
        let json = serde_json::to_string(&message).expect("serialize");
        assert!(!json.contains("imageUrl"));

        let back: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, message);
    }

    #[test]
    fn rejects_unknown_roles() {
        let raw = r#"{"role":"system","content":"x","timestamp":1}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn store_keeps_keys_unique_and_increasing() {
        let mut store = MessageStore::new();
        let a = store.push(Message::new(Role::User, "a", MessageKey(1000)));
        let b = store.push(Message::new(Role::Assistant, "b", MessageKey(1000)));
        let c = store.push(Message::new(Role::User, "c", MessageKey(900)));
        assert_eq!(a, MessageKey(1000));
        assert_eq!(b, MessageKey(1001));
        assert_eq!(c, MessageKey(1002));
        assert_eq!(store.get(b).map(|m| m.content.as_str()), Some("b"));
        assert!(store.get(MessageKey(42)).is_none());
    }

    #[test]
    fn last_assistant_skips_trailing_user_messages() {
        let store = MessageStore::from_messages(vec![
            Message::new(Role::User, "q1", MessageKey(1)),
            Message::new(Role::Assistant, "a1", MessageKey(2)),
            Message::new(Role::User, "q2", MessageKey(3)),
        ]);
        assert_eq!(store.last_assistant().map(|m| m.content.as_str()), Some("a1"));
    }
}
