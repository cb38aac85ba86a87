//! Output rendering for the chat session.
//!
//! Assistant text is written in green inside a [`ColorGuard`], which resets
//! the terminal color when it goes out of scope, including when the write in
//! between fails.

use std::io::{self, Stdout, Write};

/// ANSI escape code for green text (used for assistant replies).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering session output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Captured output in tests
pub trait Renderer: Send {
    /// Print one assistant message, in the assistant color when enabled.
    fn print_assistant(&mut self, text: &str);

    /// Print an informational line without styling.
    fn print_info(&mut self, info: &str);

    /// Print an error line without styling.
    fn print_error(&mut self, error: &str);
}

/// Switches the foreground color for as long as it lives.
///
/// The reset sequence is written on drop, so every exit path out of the
/// scope, including an early return on a failed write, restores the color.
pub struct ColorGuard<'a, W: Write> {
    out: &'a mut W,
    active: bool,
}

impl<'a, W: Write> ColorGuard<'a, W> {
    /// Writes `color` to `out` when `enabled`; the returned guard resets it.
    pub fn new(out: &'a mut W, color: &str, enabled: bool) -> io::Result<Self> {
        if enabled {
            out.write_all(color.as_bytes())?;
        }
        Ok(Self {
            out,
            active: enabled,
        })
    }

    /// The writer the colored text goes to.
    pub fn writer(&mut self) -> &mut W {
        self.out
    }
}

impl<W: Write> Drop for ColorGuard<'_, W> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.out.write_all(ANSI_RESET.as_bytes());
        }
        let _ = self.out.flush();
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Writes to stdout by default; [`PlainTextRenderer::with_writer`] accepts any
/// writer, which is how tests capture output.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_assistant(&mut self, text: &str) {
        let Ok(mut guard) = ColorGuard::new(&mut self.out, ANSI_GREEN, self.use_color) else {
            return;
        };
        let out = guard.writer();
        let _ = out
            .write_all(text.as_bytes())
            .and_then(|_| out.write_all(b"\n"));
    }

    fn print_info(&mut self, info: &str) {
        let _ = self.write_line(info);
    }

    fn print_error(&mut self, error: &str) {
        let _ = self.write_line(error);
    }
}
