use serde::{Deserialize, Serialize};

use crate::types::{Message, Usage};

/// One candidate reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Position of the candidate in the response.
    #[serde(default)]
    pub index: u32,

    /// The generated message.
    pub message: Message,

    /// Why generation stopped, e.g. `stop` or `length`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl Choice {
    /// Create an assistant candidate with the given text.
    pub fn new(index: u32, content: impl Into<String>) -> Self {
        Self {
            index,
            message: Message::assistant(content),
            finish_reason: Some("stop".to_string()),
        }
    }
}

/// Body of a `chat/completions` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Server-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that actually served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Zero or more candidates, in the order the server returned them.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Token accounting, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Create a response carrying one candidate per text, in order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Choice::new(index as u32, text))
            .collect();
        Self {
            choices,
            ..Self::default()
        }
    }

    /// Create a response with no candidates.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;
    use serde_json::json;

    #[test]
    fn response_deserialization() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1694268190,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
        }))
        .unwrap();

        assert_eq!(response.id.as_deref(), Some("chatcmpl-123"));
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.role, MessageRole::Assistant);
        assert_eq!(response.choices[0].message.content, "Hi!");
        assert_eq!(response.usage, Some(Usage::new(9, 2)));
    }

    #[test]
    fn missing_choices_is_empty() {
        let response: CompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.choices.is_empty());
        assert!(response.usage.is_none());
    }

    #[test]
    fn from_texts_preserves_order() {
        let response = CompletionResponse::from_texts(["a", "b"]);
        assert_eq!(response.choices[0].index, 0);
        assert_eq!(response.choices[1].message.content, "b");
    }
}
