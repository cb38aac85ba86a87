//! Line sources for the chat session.
//!
//! The session pulls one line at a time through [`LineSource`].  On a terminal
//! that is [`ReadlineInput`], a `rustyline` editor running on its own thread;
//! anything implementing `tokio`'s `AsyncBufRead` works too, which is what the
//! tests feed the session with.

use std::thread;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// One read from a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line of text without its terminator.
    Line(String),
    /// The input stream is closed.
    EndOfInput,
    /// The operator interrupted the read (Ctrl-C at the prompt).
    Interrupted,
}

/// Source of operator input, one line per call.
#[async_trait::async_trait]
pub trait LineSource: Send {
    /// Waits for the next line.
    async fn read_line(&mut self) -> Result<InputEvent>;
}

#[async_trait::async_trait]
impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn read_line(&mut self) -> Result<InputEvent> {
        match self.next_line().await {
            Ok(Some(line)) => Ok(InputEvent::Line(line)),
            Ok(None) => Ok(InputEvent::EndOfInput),
            Err(err) => Err(Error::io("failed to read input", err)),
        }
    }
}

type LineReply = oneshot::Sender<Result<InputEvent>>;

/// Interactive line editor with history.
///
/// `rustyline` blocks, so the editor lives on a dedicated thread and reads a
/// line only when [`LineSource::read_line`] asks for one; nothing is read
/// while a reply is being printed.  Dropping the input stops the thread once
/// it is idle.
///
/// # Terminal state
///
/// `readline` cannot be interrupted from another thread.  If the session ends
/// through the shutdown token (SIGTERM delivered via `ctrlc`) while the prompt
/// is waiting, the process exits with the editor still in raw mode and the
/// terminal is not restored.  Ctrl-C typed at the prompt does not have this
/// problem: `rustyline` handles it, restores the terminal, and reports
/// [`InputEvent::Interrupted`].
pub struct ReadlineInput {
    requests: mpsc::Sender<LineReply>,
}

impl ReadlineInput {
    /// Starts the editor thread; `prompt` is shown before every line.
    pub fn spawn(prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        let (requests, mut pending) = mpsc::channel::<LineReply>(1);
        thread::Builder::new()
            .name("consolechat-readline".to_string())
            .spawn(move || {
                let mut editor = match DefaultEditor::new() {
                    Ok(editor) => Some(editor),
                    Err(err) => {
                        tracing::error!(error = %err, "could not start line editor");
                        None
                    }
                };
                while let Some(reply) = pending.blocking_recv() {
                    let event = match editor.as_mut() {
                        Some(editor) => read_one(editor, &prompt),
                        None => Err(Error::input("line editor is unavailable")),
                    };
                    if reply.send(event).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| Error::io("failed to spawn line editor thread", err))?;
        Ok(Self { requests })
    }
}

fn read_one(editor: &mut DefaultEditor, prompt: &str) -> Result<InputEvent> {
    match editor.readline(prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                let _ = editor.add_history_entry(line.as_str());
            }
            Ok(InputEvent::Line(line))
        }
        Err(ReadlineError::Eof) => Ok(InputEvent::EndOfInput),
        Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
        Err(err) => Err(Error::input(err.to_string())),
    }
}

#[async_trait::async_trait]
impl LineSource for ReadlineInput {
    async fn read_line(&mut self) -> Result<InputEvent> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(reply)
            .await
            .map_err(|_| Error::input("line editor thread has exited"))?;
        response
            .await
            .map_err(|_| Error::input("line editor thread has exited"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn reader_lines() {
        let mut lines = BufReader::new(&b"Hello\n\n:q\n"[..]).lines();
        assert_eq!(
            lines.read_line().await.unwrap(),
            InputEvent::Line("Hello".to_string())
        );
        assert_eq!(
            lines.read_line().await.unwrap(),
            InputEvent::Line(String::new())
        );
        assert_eq!(
            lines.read_line().await.unwrap(),
            InputEvent::Line(":q".to_string())
        );
        assert_eq!(lines.read_line().await.unwrap(), InputEvent::EndOfInput);
    }

    #[tokio::test]
    async fn last_line_without_newline() {
        let mut lines = BufReader::new(&b"tail"[..]).lines();
        assert_eq!(
            lines.read_line().await.unwrap(),
            InputEvent::Line("tail".to_string())
        );
        assert_eq!(lines.read_line().await.unwrap(), InputEvent::EndOfInput);
    }
}
