//! Session State Machine
//!
//! ```text
//! Idle ──start──▶ Requesting ──chunk──▶ Streaming ──eos──▶ Revealing ──▶ Done
//!                    │  │                  │  ▲ chunk          ▲
//!                    │  └──────eos (empty)─┼──┴────────────────┘
//!                    └──failure──▶ Error ◀─┘ failure
//!
//! any non-terminal ──cancel──▶ Idle (cancelled)
//! ```
//!
//! [`SessionState`] is owned by exactly one session driver. The buffer only
//! grows while `Streaming`, and the reveal index only grows, never past the
//! buffer.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::streaming::TextChunk;

/// Identifies one request/playback pair
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InsightId(pub String);

impl InsightId {
    /// Generate a new unique id
    ///
    /// Uses an atomic counter combined with a timestamp so ids stay unique
    /// even when sessions are started within the same millisecond.
    #[must_use]
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::time::{SystemTime, UNIX_EPOCH};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(format!("insight_{timestamp}_{count}"))
    }
}

impl Default for InsightId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InsightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Not started, or cancelled
    #[default]
    Idle,
    /// Waiting for the response head or the first chunk
    Requesting,
    /// Receiving chunks
    Streaming,
    /// Stream complete, reveal catching up
    Revealing,
    /// Everything received and shown
    Done,
    /// Failed; see the error message
    Error,
}

impl SessionStatus {
    /// `Done` or `Error`
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// `Requesting`, `Streaming` or `Revealing`
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming | Self::Revealing)
    }

    /// Whether the state machine allows `self -> next`
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionStatus::{Done, Error, Idle, Requesting, Revealing, Streaming};

        match (self, next) {
            (Idle, Requesting)
            | (Requesting, Streaming | Revealing | Error)
            | (Streaming, Streaming | Revealing | Error)
            | (Revealing, Done) => true,
            (from, Idle) => from.is_active(),
            _ => false,
        }
    }

    /// Lowercase label for logs and status lines
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Revealing => "revealing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only view of a session for the display layer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session this describes (None before the first session)
    pub id: Option<InsightId>,
    /// Current status
    pub status: SessionStatus,
    /// `buffer[0..reveal_index]`
    pub visible_text: String,
    /// Human-readable failure, set with `Error`
    pub error_message: Option<String>,
    /// Whether the session was cancelled or superseded
    pub cancelled: bool,
    /// Characters visible (the reveal index)
    pub revealed: usize,
    /// Characters received so far
    pub buffered: usize,
}

impl SessionSnapshot {
    /// Whether nothing further will change for this session
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() || self.cancelled
    }

    /// Visible text followed by an error indicator, if any
    #[must_use]
    pub fn display_text(&self) -> String {
        match &self.error_message {
            Some(message) if self.visible_text.is_empty() => format!("⚠ {message}"),
            Some(message) => format!("{}\n\n⚠ {message}", self.visible_text),
            None => self.visible_text.clone(),
        }
    }
}

/// Mutable state of one session
#[derive(Clone, Debug)]
pub struct SessionState {
    id: InsightId,
    status: SessionStatus,
    /// Decoded text, append-only
    buffer: String,
    /// Characters in `buffer`
    buffered_chars: usize,
    /// Characters revealed
    reveal_index: usize,
    /// Byte offset of `reveal_index` in `buffer`
    reveal_offset: usize,
    error_message: Option<String>,
    cancelled: bool,
}

impl SessionState {
    /// Fresh `Idle` state
    #[must_use]
    pub fn new(id: InsightId) -> Self {
        Self {
            id,
            status: SessionStatus::Idle,
            buffer: String::new(),
            buffered_chars: 0,
            reveal_index: 0,
            reveal_offset: 0,
            error_message: None,
            cancelled: false,
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &InsightId {
        &self.id
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Full decoded buffer, including text not yet revealed
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Characters revealed so far
    #[must_use]
    pub fn reveal_index(&self) -> usize {
        self.reveal_index
    }

    /// Characters received so far
    #[must_use]
    pub fn buffered_chars(&self) -> usize {
        self.buffered_chars
    }

    /// Characters received but not yet visible
    #[must_use]
    pub fn unrevealed_count(&self) -> usize {
        self.buffered_chars - self.reveal_index
    }

    /// Whether any received text is still hidden
    #[must_use]
    pub fn has_unrevealed(&self) -> bool {
        self.reveal_index < self.buffered_chars
    }

    /// The revealed prefix of the buffer
    #[must_use]
    pub fn visible_text(&self) -> &str {
        &self.buffer[..self.reveal_offset]
    }

    /// Failure message, once in `Error`
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Whether the session was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Terminal or cancelled
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() || self.cancelled
    }

    fn transition(&mut self, next: SessionStatus) -> bool {
        if self.cancelled || !self.status.can_transition_to(next) {
            warn!(
                session = %self.id,
                from = %self.status,
                to = %next,
                cancelled = self.cancelled,
                "rejected session transition"
            );
            return false;
        }
        self.status = next;
        true
    }

    /// `Idle -> Requesting`
    pub fn begin(&mut self) -> bool {
        self.transition(SessionStatus::Requesting)
    }

    /// Append a chunk (`Requesting -> Streaming` on the first one)
    ///
    /// Returns `false` and leaves the buffer untouched unless the session is
    /// `Requesting` or `Streaming`.
    pub fn append(&mut self, chunk: &TextChunk) -> bool {
        if !matches!(
            self.status,
            SessionStatus::Requesting | SessionStatus::Streaming
        ) || !self.transition(SessionStatus::Streaming)
        {
            return false;
        }
        self.buffer.push_str(chunk.as_str());
        self.buffered_chars += chunk.char_count();
        true
    }

    /// End-of-stream: `Streaming | Requesting -> Revealing`
    pub fn complete_stream(&mut self) -> bool {
        self.transition(SessionStatus::Revealing)
    }

    /// Reveal up to `count` more characters
    ///
    /// Never moves past the buffer. Returns how many became visible.
    pub fn reveal(&mut self, count: usize) -> usize {
        if self.cancelled
            || !matches!(
                self.status,
                SessionStatus::Streaming | SessionStatus::Revealing
            )
        {
            return 0;
        }

        let step = count.min(self.unrevealed_count());
        let advanced: usize = self.buffer[self.reveal_offset..]
            .chars()
            .take(step)
            .map(char::len_utf8)
            .sum();
        self.reveal_offset += advanced;
        self.reveal_index += step;
        step
    }

    /// `Revealing -> Done`, only once everything is visible
    pub fn finish(&mut self) -> bool {
        if self.has_unrevealed() {
            return false;
        }
        self.transition(SessionStatus::Done)
    }

    /// Any active status `-> Error`
    pub fn fail_with(&mut self, message: String) -> bool {
        if !self.transition(SessionStatus::Error) {
            return false;
        }
        self.error_message = Some(message);
        true
    }

    /// Cancel: active `-> Idle` with the cancelled flag set
    ///
    /// Idempotent; a no-op on settled or never-started sessions. Revealed
    /// text is kept.
    pub fn cancel(&mut self) -> bool {
        if self.cancelled || !self.status.is_active() {
            return false;
        }
        self.status = SessionStatus::Idle;
        self.cancelled = true;
        true
    }

    /// Snapshot for the display layer
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: Some(self.id.clone()),
            status: self.status,
            visible_text: self.visible_text().to_string(),
            error_message: self.error_message.clone(),
            cancelled: self.cancelled,
            revealed: self.reveal_index,
            buffered: self.buffered_chars,
        }
    }
}
