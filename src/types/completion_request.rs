use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Sampling controls passed through to the model unmodified.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingParams {
    /// Upper bound on generated tokens per candidate.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling mass.  Omitted from the request when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Penalty applied to tokens in proportion to how often they appeared.
    pub frequency_penalty: f32,

    /// Penalty applied to tokens that appeared at all.
    pub presence_penalty: f32,

    /// Number of candidates to generate.  Omitted when unset so the server
    /// default applies.
    #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub choice_count: Option<u32>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.4,
            top_p: None,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            choice_count: None,
        }
    }
}

/// Body of a `chat/completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Which model the remote service should use.
    pub model: String,

    /// The full transcript, oldest message first.
    pub messages: Vec<Message>,

    /// Sampling controls.
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    /// Create a new request with default sampling parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            sampling: SamplingParams::default(),
        }
    }

    /// Replace the sampling parameters.
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn request_flattens_sampling() {
        let request = CompletionRequest::new(
            "gpt-4o-mini",
            vec![Message::system("Be brief."), Message::user("Hello")],
        );
        let json = to_value(&request).unwrap();

        assert_eq!(
            json,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello"}
                ],
                "max_tokens": 1500,
                "temperature": 0.4f32,
                "frequency_penalty": 0.0,
                "presence_penalty": 0.0
            })
        );
    }

    #[test]
    fn optional_sampling_fields() {
        let sampling = SamplingParams {
            top_p: Some(0.5),
            choice_count: Some(2),
            ..SamplingParams::default()
        };
        let request = CompletionRequest::new("m", vec![]).with_sampling(sampling);
        let json = to_value(&request).unwrap();
        assert_eq!(json["top_p"], json!(0.5));
        assert_eq!(json["n"], json!(2));
    }
}
