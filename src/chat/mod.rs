//! Interactive console chat.
//!
//! This module provides the read-eval-print loop built on top of the
//! completion client.  It supports:
//!
//! - Layered settings from defaults, a YAML file, the environment, and flags
//! - A transcript seeded with the system prompt and sent in full every turn
//! - Every returned candidate printed in the assistant color
//! - Bounded retries and rollback of failed turns
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and settings
//! - [`input`]: line sources (interactive editor or any async reader)
//! - [`transcript`]: the ordered message history
//! - [`session`]: the loop that ties them to a [`crate::client::CompletionClient`]

pub mod config;
pub mod input;
pub mod session;
pub mod transcript;

pub use config::{CONFIG_ENV, ChatArgs, DEFAULT_CONFIG_FILE, DEFAULT_MODEL, Settings};
pub use input::{InputEvent, LineSource, ReadlineInput};
pub use session::{
    ChatSession, EXIT_SENTINEL, GREETING, NO_CANDIDATES_MESSAGE, SessionEnd, SessionStats,
    TurnOutcome, is_exit_sentinel,
};
pub use transcript::Transcript;
