// Public modules
pub mod completion_request;
pub mod completion_response;
pub mod message;
pub mod usage;

// Re-exports
pub use completion_request::{CompletionRequest, SamplingParams};
pub use completion_response::{Choice, CompletionResponse};
pub use message::{Message, MessageRole};
pub use usage::Usage;
