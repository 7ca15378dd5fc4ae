//! Per-command response object.

use std::cell::Cell;
use std::time::Duration;

thread_local! {
    static LIVE: Cell<usize> = const { Cell::new(0) };
}

/// Lines and limits of one command's outcome.
///
/// A `Response` is created by the call that issues the command, filled by the
/// transport, and released when it goes out of scope, on every return path.
/// Only one should be alive per thread at a time; [`Response::live_on_current_thread`]
/// exposes the count so callers can check the discipline.
#[derive(Debug)]
pub struct Response {
    buf_size: usize,
    line_limit: usize,
    timeout: Duration,
    lines: Vec<String>,
    used: usize,
    truncated: bool,
}

impl Response {
    /// Creates an empty response.
    ///
    /// * `buf_size` - byte budget for retained lines
    /// * `line_limit` - complete after this many lines, `0` waits for the terminal line
    /// * `timeout` - how long the transport waits for completion
    pub fn new(buf_size: usize, line_limit: usize, timeout: Duration) -> Self {
        LIVE.with(|live| live.set(live.get() + 1));
        Self {
            buf_size,
            line_limit,
            timeout,
            lines: Vec::new(),
            used: 0,
            truncated: false,
        }
    }

    /// Number of responses alive on the calling thread.
    pub fn live_on_current_thread() -> usize {
        LIVE.with(Cell::get)
    }

    /// Byte budget for retained lines.
    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    /// Line count after which the command completes, `0` for none.
    pub fn line_limit(&self) -> usize {
        self.line_limit
    }

    /// How long the transport waits for completion.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of retained lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns line `n`, counting from 1.
    pub fn line(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    /// Iterates over retained lines in arrival order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Returns the first line starting with `prefix`.
    pub fn line_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.lines().find(|line| line.starts_with(prefix))
    }

    /// Whether lines were dropped because the byte budget ran out.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Appends a line if it fits the byte budget. Returns `false` when dropped.
    pub fn push_line(&mut self, line: &str) -> bool {
        if self.used + line.len() > self.buf_size {
            self.truncated = true;
            return false;
        }
        self.used += line.len();
        self.lines.push(String::from(line));
        true
    }

    /// Forgets previous lines so the response can be reused for the next command.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.used = 0;
        self.truncated = false;
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        LIVE.with(|live| live.set(live.get().saturating_sub(1)));
    }
}
