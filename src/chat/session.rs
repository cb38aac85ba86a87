//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the transcript,
//! drives the read-eval-print loop, and talks to the completion service.

use tokio_util::sync::CancellationToken;

use crate::chat::config::Settings;
use crate::chat::input::{InputEvent, LineSource};
use crate::chat::transcript::Transcript;
use crate::client::CompletionClient;
use crate::error::{Error, FailureClass, Result};
use crate::observability::{
    SESSION_EMPTY_RESPONSES, SESSION_RETRIES, SESSION_ROLLBACKS, SESSION_TURNS,
};
use crate::render::Renderer;
use crate::types::{CompletionRequest, CompletionResponse, SamplingParams, Usage};

/// Greeting printed, in the assistant color, when the session starts.
pub const GREETING: &str = "Hi, I'm here to help. What could I do for you? (For exit type ':q')";

/// Printed when the service answers with no candidates.
pub const NO_CANDIDATES_MESSAGE: &str =
    "I'm sorry, I don't know how to respond to that, try paraphrasing.";

/// Input that ends the session, compared case-insensitively.
pub const EXIT_SENTINEL: &str = ":q";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The operator typed the exit sentinel.
    Exit,
    /// The input stream closed.
    EndOfInput,
    /// The shutdown token was cancelled or the operator interrupted the prompt.
    Cancelled,
}

/// What became of one user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The service returned this many candidates; each was printed and recorded.
    Answered(usize),
    /// The service returned no candidates; the fallback message was printed.
    NoCandidates,
    /// A transient failure outlived its retries; the user turn was rolled back.
    Failed,
    /// Shutdown was requested mid-request; the user turn was rolled back.
    Cancelled,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the transcript, system prompt included.
    pub message_count: usize,
    /// Total number of completion requests issued, retries included.
    pub total_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// Total prompt tokens reported by the service.
    pub total_prompt_tokens: u64,
    /// Total completion tokens reported by the service.
    pub total_completion_tokens: u64,
}

/// A chat session that owns the transcript and the completion client.
pub struct ChatSession<C: CompletionClient> {
    client: C,
    model: String,
    sampling: SamplingParams,
    max_retries: u32,
    transcript: Transcript,
    shutdown: CancellationToken,
    usage_totals: Usage,
    request_count: u64,
    failed_requests: u64,
}

impl<C: CompletionClient> ChatSession<C> {
    /// Creates a new chat session.
    ///
    /// The transcript is seeded with the configured system prompt.  `shutdown`
    /// is shared with the host: cancelling it ends the session, and the session
    /// cancels it when the operator exits.
    pub fn new(client: C, settings: &Settings, shutdown: CancellationToken) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            sampling: settings.sampling(),
            max_retries: settings.max_retries,
            transcript: Transcript::new(settings.system_prompt.clone()),
            shutdown,
            usage_totals: Usage::default(),
            request_count: 0,
            failed_requests: 0,
        }
    }

    /// Runs the read-eval-print loop until the operator exits, the input
    /// closes, or shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns the error when a fatal failure ends the session (bad
    /// credentials, rejected request) or when the input source breaks.
    pub async fn run(
        &mut self,
        input: &mut dyn LineSource,
        renderer: &mut dyn Renderer,
    ) -> Result<SessionEnd> {
        renderer.print_assistant(GREETING);

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(SessionEnd::Cancelled),
                event = input.read_line() => event?,
            };

            let line = match event {
                InputEvent::Line(line) => line,
                InputEvent::EndOfInput => return Ok(self.finish(SessionEnd::EndOfInput)),
                InputEvent::Interrupted => return Ok(self.finish(SessionEnd::Cancelled)),
            };

            if line.trim().is_empty() {
                continue;
            }
            if is_exit_sentinel(&line) {
                return Ok(self.finish(SessionEnd::Exit));
            }

            if self.submit(&line, renderer).await? == TurnOutcome::Cancelled {
                return Ok(SessionEnd::Cancelled);
            }
        }
    }

    /// Sends one user turn and renders the reply.
    ///
    /// This method:
    /// 1. Adds the user message to the transcript
    /// 2. Sends the whole transcript to the service, retrying transient failures
    /// 3. Prints and records every candidate, or the fallback when there are none
    ///
    /// On any failure the user message is removed again so the transcript
    /// never holds an unanswered turn.
    ///
    /// # Errors
    ///
    /// Returns an error, after printing it, if the failure is fatal.
    pub async fn submit(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        SESSION_TURNS.click();
        let previous_len = self.transcript.len();
        self.transcript.push_user(user_input);

        let request = CompletionRequest::new(self.model.clone(), self.transcript.messages().to_vec())
            .with_sampling(self.sampling);

        let response = match self.complete_with_retry(&request).await {
            Ok(response) => response,
            Err(err) => {
                self.transcript.rollback(previous_len);
                SESSION_ROLLBACKS.click();
                return self.handle_failure(err, renderer);
            }
        };

        if let Some(usage) = response.usage {
            self.usage_totals = self.usage_totals + usage;
        }

        if response.choices.is_empty() {
            SESSION_EMPTY_RESPONSES.click();
            renderer.print_info(NO_CANDIDATES_MESSAGE);
            return Ok(TurnOutcome::NoCandidates);
        }

        let count = response.choices.len();
        for choice in response.choices {
            renderer.print_assistant(&choice.message.content);
            self.transcript.push_assistant(choice.message.content);
        }
        Ok(TurnOutcome::Answered(count))
    }

    /// The transcript so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.transcript.len()
    }

    /// The completion client the session talks to.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.message_count(),
            total_requests: self.request_count,
            failed_requests: self.failed_requests,
            total_prompt_tokens: self.usage_totals.prompt_tokens,
            total_completion_tokens: self.usage_totals.completion_tokens,
        }
    }

    async fn complete_with_retry(&mut self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut attempt = 0;
        loop {
            self.request_count += 1;
            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    Err(Error::abort("shutdown requested while waiting for the completion"))
                }
                result = self.client.complete(request) => result,
            };
            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            self.failed_requests += 1;
            if err.is_abort() || err.class() == FailureClass::Fatal || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            SESSION_RETRIES.click();
            tracing::warn!(error = %err, attempt, "transient completion failure; retrying");
        }
    }

    fn handle_failure(&self, err: Error, renderer: &mut dyn Renderer) -> Result<TurnOutcome> {
        if err.is_abort() {
            tracing::debug!("completion abandoned for shutdown");
            return Ok(TurnOutcome::Cancelled);
        }
        match err.class() {
            FailureClass::Transient => {
                tracing::warn!(error = %err, "completion failed; turn discarded");
                renderer.print_error(&format!("The request failed ({err}). Please try again."));
                Ok(TurnOutcome::Failed)
            }
            FailureClass::Fatal => {
                tracing::error!(error = %err, "fatal completion failure");
                renderer.print_error(&format!("Error: {err}"));
                Err(err)
            }
        }
    }

    fn finish(&self, end: SessionEnd) -> SessionEnd {
        self.shutdown.cancel();
        end
    }
}

/// True when `input` is exactly the exit sentinel, in any letter case.
pub fn is_exit_sentinel(input: &str) -> bool {
    input.eq_ignore_ascii_case(EXIT_SENTINEL)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::io::{AsyncBufReadExt, BufReader};

    use super::*;
    use crate::render::PlainTextRenderer;
    use crate::types::{Message, MessageRole};

    /// Completion client that replays canned results and records requests.
    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<CompletionResponse>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn with_replies(replies: Vec<Result<CompletionResponse>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CompletionResponse::empty()))
        }
    }

    /// Completion client that never answers.
    struct HangingClient;

    #[async_trait::async_trait]
    impl CompletionClient for HangingClient {
        async fn complete(&self, _: &CompletionRequest) -> Result<CompletionResponse> {
            std::future::pending().await
        }
    }

    fn settings() -> Settings {
        Settings {
            key: "test-key".to_string(),
            system_prompt: "You are terse.".to_string(),
            ..Settings::default()
        }
    }

    fn session(replies: Vec<Result<CompletionResponse>>) -> ChatSession<ScriptedClient> {
        ChatSession::new(
            ScriptedClient::with_replies(replies),
            &settings(),
            CancellationToken::new(),
        )
    }

    fn renderer() -> PlainTextRenderer<Vec<u8>> {
        PlainTextRenderer::with_writer(Vec::new(), true)
    }

    fn output(renderer: PlainTextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    async fn run_script(
        session: &mut ChatSession<ScriptedClient>,
        script: &'static str,
    ) -> (Result<SessionEnd>, String) {
        let mut input = BufReader::new(script.as_bytes()).lines();
        let mut renderer = renderer();
        let end = session.run(&mut input, &mut renderer).await;
        (end, output(renderer))
    }

    fn greeting() -> String {
        format!("\x1b[32m{GREETING}\n\x1b[0m")
    }

    #[test]
    fn sentinel_matching() {
        assert!(is_exit_sentinel(":q"));
        assert!(is_exit_sentinel(":Q"));
        assert!(!is_exit_sentinel("  :q  "));
        assert!(!is_exit_sentinel(":q "));
        assert!(!is_exit_sentinel(":quit"));
        assert!(!is_exit_sentinel("q"));
    }

    #[test]
    fn new_session_has_only_system_prompt() {
        let session = session(vec![]);
        assert_eq!(session.message_count(), 1);
        assert_eq!(
            session.transcript().messages()[0],
            Message::system("You are terse.")
        );
    }

    #[tokio::test]
    async fn hello_round_trip() {
        let mut session = session(vec![Ok(CompletionResponse::from_texts(["Hi!"]))]);
        let (end, out) = run_script(&mut session, "Hello\n:q\n").await;

        assert_eq!(end.unwrap(), SessionEnd::Exit);
        let requests = session.client().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].messages,
            vec![Message::system("You are terse."), Message::user("Hello")]
        );
        assert_eq!(requests[0].model, settings().model);
        assert_eq!(requests[0].sampling, settings().sampling());
        assert_eq!(
            session.transcript().messages(),
            &[
                Message::system("You are terse."),
                Message::user("Hello"),
                Message::assistant("Hi!")
            ]
        );
        assert_eq!(out, format!("{}\x1b[32mHi!\n\x1b[0m", greeting()));
    }

    #[tokio::test]
    async fn blank_input_then_exit_issues_no_requests() {
        let token = CancellationToken::new();
        let mut session = ChatSession::new(ScriptedClient::default(), &settings(), token.clone());
        let (end, out) = run_script(&mut session, "\n   \n\t\n:q\n").await;

        assert_eq!(end.unwrap(), SessionEnd::Exit);
        assert!(session.client().requests().is_empty());
        assert_eq!(session.message_count(), 1);
        assert!(token.is_cancelled());
        assert_eq!(out, greeting());
    }

    #[tokio::test]
    async fn sentinel_is_case_insensitive() {
        let mut session = session(vec![]);
        let (end, _) = run_script(&mut session, ":Q\nnever sent\n").await;
        assert_eq!(end.unwrap(), SessionEnd::Exit);
        assert!(session.client().requests().is_empty());
        assert_eq!(session.message_count(), 1);
    }

    #[tokio::test]
    async fn padded_sentinel_is_a_user_turn() {
        let mut session = session(vec![Ok(CompletionResponse::from_texts(["Bye?"]))]);
        let (end, _) = run_script(&mut session, " :q \n:q\n").await;

        assert_eq!(end.unwrap(), SessionEnd::Exit);
        let requests = session.client().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.last(), Some(&Message::user(" :q ")));
        assert_eq!(
            session.transcript().messages(),
            &[
                Message::system("You are terse."),
                Message::user(" :q "),
                Message::assistant("Bye?")
            ]
        );
    }

    #[tokio::test]
    async fn end_of_input_behaves_like_exit() {
        let token = CancellationToken::new();
        let mut session = ChatSession::new(ScriptedClient::default(), &settings(), token.clone());
        let (end, _) = run_script(&mut session, "").await;
        assert_eq!(end.unwrap(), SessionEnd::EndOfInput);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn no_candidates_prints_fallback_only() {
        let mut session = session(vec![Ok(CompletionResponse::empty())]);
        let mut renderer = renderer();
        let outcome = session.submit("Hmm", &mut renderer).await.unwrap();

        assert_eq!(outcome, TurnOutcome::NoCandidates);
        assert_eq!(output(renderer), format!("{NO_CANDIDATES_MESSAGE}\n"));
        assert_eq!(session.transcript().count(MessageRole::Assistant), 0);
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn every_candidate_is_printed_and_recorded_in_order() {
        let mut session = session(vec![
            Ok(CompletionResponse::from_texts(["first", "second", "third"])),
            Ok(CompletionResponse::from_texts(["again"])),
        ]);
        let mut renderer = renderer();

        let outcome = session.submit("one", &mut renderer).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Answered(3));
        assert_eq!(session.message_count(), 1 + 1 + 3);

        let outcome = session.submit("two", &mut renderer).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Answered(1));
        assert_eq!(session.message_count(), 5 + 1 + 1);

        let contents: Vec<_> = session
            .transcript()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            contents,
            vec![
                (MessageRole::System, "You are terse."),
                (MessageRole::User, "one"),
                (MessageRole::Assistant, "first"),
                (MessageRole::Assistant, "second"),
                (MessageRole::Assistant, "third"),
                (MessageRole::User, "two"),
                (MessageRole::Assistant, "again"),
            ]
        );
        // The second request carries the whole transcript.
        assert_eq!(session.client().requests()[1].messages.len(), 6);
        assert_eq!(
            output(renderer),
            "\x1b[32mfirst\n\x1b[0m\x1b[32msecond\n\x1b[0m\x1b[32mthird\n\x1b[0m\x1b[32magain\n\x1b[0m"
        );
    }

    #[tokio::test]
    async fn user_message_precedes_request() {
        let mut session = session(vec![Ok(CompletionResponse::empty())]);
        let mut renderer = renderer();
        session.submit("question", &mut renderer).await.unwrap();
        let sent = &session.client().requests()[0].messages;
        assert_eq!(sent.last(), Some(&Message::user("question")));
        assert_eq!(sent.iter().filter(|m| m.role == MessageRole::User).count(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let mut session = session(vec![
            Err(Error::timeout("slow", Some(60.0))),
            Ok(CompletionResponse::from_texts(["made it"])),
        ]);
        let mut renderer = renderer();
        let outcome = session.submit("hi", &mut renderer).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Answered(1));
        assert_eq!(session.client().requests().len(), 2);
        assert_eq!(session.stats().total_requests, 2);
        assert_eq!(session.stats().failed_requests, 1);
    }

    #[tokio::test]
    async fn persistent_transient_failure_rolls_back() {
        let mut session = session(vec![
            Err(Error::connection("refused", None)),
            Err(Error::connection("refused", None)),
        ]);
        let mut renderer = renderer();
        let outcome = session.submit("hi", &mut renderer).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.client().requests().len(), 2);
        assert_eq!(
            output(renderer),
            "The request failed (Connection error: refused). Please try again.\n"
        );
    }

    #[tokio::test]
    async fn session_survives_transient_failure() {
        let mut session = session(vec![
            Err(Error::service_unavailable("busy", None)),
            Err(Error::service_unavailable("busy", None)),
            Ok(CompletionResponse::from_texts(["back"])),
        ]);
        let (end, _) = run_script(&mut session, "first\nsecond\n:q\n").await;

        assert_eq!(end.unwrap(), SessionEnd::Exit);
        assert_eq!(
            session.transcript().messages(),
            &[
                Message::system("You are terse."),
                Message::user("second"),
                Message::assistant("back")
            ]
        );
    }

    #[tokio::test]
    async fn fatal_failure_ends_session() {
        let mut session = session(vec![Err(Error::authentication("bad key"))]);
        let (end, out) = run_script(&mut session, "Hello\nnever read\n").await;

        let err = end.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(session.client().requests().len(), 1);
        assert_eq!(session.message_count(), 1);
        assert!(out.ends_with("Error: Authentication error: bad key\n"));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let token = CancellationToken::new();
        let mut session = ChatSession::new(HangingClient, &settings(), token.clone());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let mut input = BufReader::new(&b"Hello\n"[..]).lines();
        let mut renderer = renderer();
        let end = session.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(session.message_count(), 1);
        assert_eq!(output(renderer), greeting());
    }

    #[tokio::test]
    async fn cancelled_before_input_stops_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let mut session = ChatSession::new(ScriptedClient::default(), &settings(), token);
        let (end, _) = run_script(&mut session, "Hello\n").await;
        assert_eq!(end.unwrap(), SessionEnd::Cancelled);
        assert!(session.client().requests().is_empty());
    }

    #[tokio::test]
    async fn interrupt_at_prompt_cancels() {
        struct Interrupting;

        #[async_trait::async_trait]
        impl LineSource for Interrupting {
            async fn read_line(&mut self) -> Result<InputEvent> {
                Ok(InputEvent::Interrupted)
            }
        }

        let token = CancellationToken::new();
        let mut session = ChatSession::new(ScriptedClient::default(), &settings(), token.clone());
        let mut renderer = renderer();
        let end = session.run(&mut Interrupting, &mut renderer).await.unwrap();
        assert_eq!(end, SessionEnd::Cancelled);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn usage_is_accumulated() {
        let mut first = CompletionResponse::from_texts(["a"]);
        first.usage = Some(Usage::new(10, 2));
        let mut second = CompletionResponse::from_texts(["b"]);
        second.usage = Some(Usage::new(14, 3));
        let mut session = session(vec![Ok(first), Ok(second)]);
        let mut renderer = renderer();
        session.submit("x", &mut renderer).await.unwrap();
        session.submit("y", &mut renderer).await.unwrap();

        let stats = session.stats();
        assert_eq!(stats.message_count, 5);
        assert_eq!(stats.total_prompt_tokens, 24);
        assert_eq!(stats.total_completion_tokens, 5);
    }
}
