// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod render;
pub mod types;

// Re-exports
pub use client::{CompletionClient, OpenAi};
pub use client_logger::{ClientLogger, TracingClientLogger};
pub use error::{Error, FailureClass, Result};
pub use observability::register_biometrics;
pub use render::{ColorGuard, PlainTextRenderer, Renderer};
pub use types::*;
