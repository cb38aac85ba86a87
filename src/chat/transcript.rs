//! The conversation transcript.

use crate::types::{Message, MessageRole};

/// Ordered, append-only list of the messages exchanged in one session.
///
/// The first message is always the system prompt.  Nothing is ever reordered;
/// the only removal is [`Transcript::rollback`], which cannot reach the system
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Starts a transcript seeded with the system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Appends a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Appends an assistant turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Drops every message after the first `len`, never going below the
    /// system message.
    pub(crate) fn rollback(&mut self, len: usize) {
        self.messages.truncate(len.max(1));
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The system prompt the transcript was seeded with.
    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; the system message is always present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages with the given role.
    pub fn count(&self, role: MessageRole) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}
