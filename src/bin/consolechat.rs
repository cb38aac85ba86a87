//! Interactive console chat against an OpenAI-compatible completion service.
//!
//! # Usage
//!
//! ```bash
//! # Key from the environment, everything else from consolechat.yaml or defaults
//! CONSOLECHAT_API_KEY=sk-... consolechat
//!
//! # Pick a model and a system prompt
//! consolechat --model gpt-4o --system "You are a helpful coding assistant"
//!
//! # Settings file elsewhere, no colors, request logging on stderr
//! consolechat --config ~/chat.yaml --no-color --verbose
//! ```
//!
//! Type `:q` (any case) or send end-of-input to leave.

use std::env;
use std::sync::Arc;

use arrrg::CommandLine;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consolechat::chat::{ChatArgs, ChatSession, ReadlineInput, SessionEnd, Settings};
use consolechat::{OpenAi, PlainTextRenderer, TracingClientLogger};

const PROMPT: &str = "> ";

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("consolechat={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Main entry point for the consolechat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("consolechat [OPTIONS]");
    init_tracing(args.verbose);

    let settings = Settings::load(&args, |name| env::var(name).ok())?;
    tracing::debug!(?settings, "settings loaded");

    let client = OpenAi::from_settings(&settings)?.with_logger(Arc::new(TracingClientLogger));

    // Ctrl+C outside the prompt abandons the in-flight request and ends the session.
    let shutdown = CancellationToken::new();
    let on_interrupt = shutdown.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())?;

    let mut session = ChatSession::new(client, &settings, shutdown);
    let mut input = ReadlineInput::spawn(PROMPT)?;
    let mut renderer = PlainTextRenderer::with_color(settings.use_color);

    let end = session.run(&mut input, &mut renderer).await;
    let stats = session.stats();
    tracing::info!(
        messages = stats.message_count,
        requests = stats.total_requests,
        failed = stats.failed_requests,
        prompt_tokens = stats.total_prompt_tokens,
        completion_tokens = stats.total_completion_tokens,
        "session finished"
    );

    match end? {
        SessionEnd::Exit | SessionEnd::EndOfInput => {}
        SessionEnd::Cancelled => tracing::debug!("session cancelled"),
    }
    Ok(())
}
