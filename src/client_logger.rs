//! Logging trait for completion client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows callers to
//! capture every request and response passing through the [`OpenAi`] client,
//! and [`TracingClientLogger`], which forwards them to `tracing`.
//!
//! [`OpenAi`]: crate::OpenAi

use crate::{CompletionRequest, CompletionResponse};

/// A trait for logging completion client operations.
///
/// # Example
///
/// ```rust,ignore
/// use consolechat::{ClientLogger, CompletionRequest, CompletionResponse};
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &CompletionRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, response: &CompletionResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(response).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, request: &CompletionRequest);

    /// Log a successfully decoded response.
    fn log_response(&self, response: &CompletionResponse);
}

/// [`ClientLogger`] that emits `tracing` events at debug and trace level.
///
/// Message bodies only appear at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingClientLogger;

impl ClientLogger for TracingClientLogger {
    fn log_request(&self, request: &CompletionRequest) {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            max_tokens = request.sampling.max_tokens,
            "sending completion request"
        );
        if tracing::enabled!(tracing::Level::TRACE)
            && let Ok(body) = serde_json::to_string(request)
        {
            tracing::trace!(%body, "completion request body");
        }
    }

    fn log_response(&self, response: &CompletionResponse) {
        tracing::debug!(
            id = response.id.as_deref().unwrap_or("-"),
            choices = response.choices.len(),
            total_tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0),
            "received completion response"
        );
        if tracing::enabled!(tracing::Level::TRACE)
            && let Ok(body) = serde_json::to_string(response)
        {
            tracing::trace!(%body, "completion response body");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn tracing_logger_without_subscriber() {
        let logger = TracingClientLogger;
        logger.log_request(&CompletionRequest::new("m", vec![Message::user("hi")]));
        logger.log_response(&CompletionResponse::from_texts(["hello"]));
    }
}
