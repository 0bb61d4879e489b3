//! Session Driver
//!
//! One task per session. The driver owns the [`SessionState`], the reader's
//! event channel and the playback timer, and multiplexes them in a single
//! `select!` loop:
//!
//! ```text
//!        ┌───────────── cancel token ─────────────┐
//!        │                                         ▼
//!  ReaderEvent ──▶ ┌───────────────┐  snapshot  ┌─────────┐
//!  (mpsc)          │ SessionDriver │ ─────────▶ │  watch  │ ──▶ display layer
//!  scheduler tick ▶└───────────────┘            └─────────┘
//! ```
//!
//! Because only the driver touches the state, and the driver runs to
//! completion between suspension points, no locking is needed.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::state::{InsightId, SessionSnapshot, SessionState, SessionStatus};
use crate::error::{ErrorSink, InsightError, TransportError};
use crate::streaming::{PlaybackScheduler, ReaderEvent, ReaderEventKind, TickOutcome};

/// Write side of the shared snapshot channel, bound to one session id
///
/// Writes are dropped unless the channel currently describes this session,
/// so a superseded session can never overwrite its successor.
#[derive(Clone)]
pub(crate) struct SnapshotPublisher {
    session: InsightId,
    tx: watch::Sender<SessionSnapshot>,
}

impl SnapshotPublisher {
    pub(crate) fn new(session: InsightId, tx: watch::Sender<SessionSnapshot>) -> Self {
        Self { session, tx }
    }

    /// Publish `state`; returns whether receivers were notified
    pub(crate) fn publish(&self, state: &SessionState) -> bool {
        self.update(|current| {
            let next = state.snapshot();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    /// Record a crash of the driver task as a terminal error
    pub(crate) fn publish_crash(&self) -> bool {
        self.update(|current| {
            if current.is_settled() {
                return false;
            }
            current.status = SessionStatus::Error;
            current.error_message = Some("The insight session stopped unexpectedly.".to_string());
            true
        })
    }

    fn update(&self, modify: impl FnOnce(&mut SessionSnapshot) -> bool) -> bool {
        self.tx.send_if_modified(|current| {
            if current.id.as_ref() != Some(&self.session) {
                trace!(session = %self.session, "dropping snapshot from superseded session");
                return false;
            }
            modify(current)
        })
    }
}

/// Drives one session from `Requesting` to a settled state
pub(crate) struct SessionDriver {
    state: SessionState,
    scheduler: PlaybackScheduler,
    events: mpsc::Receiver<ReaderEvent>,
    reader: JoinHandle<()>,
    /// Set once the reader has sent its final signal or gone away
    reader_done: bool,
    cancel: CancellationToken,
    publisher: SnapshotPublisher,
}

impl SessionDriver {
    pub(crate) fn new(
        state: SessionState,
        scheduler: PlaybackScheduler,
        events: mpsc::Receiver<ReaderEvent>,
        reader: JoinHandle<()>,
        cancel: CancellationToken,
        publisher: SnapshotPublisher,
    ) -> Self {
        Self {
            state,
            scheduler,
            events,
            reader,
            reader_done: false,
            cancel,
            publisher,
        }
    }

    /// Run until the session settles; returns its final snapshot
    pub(crate) async fn run(mut self) -> SessionSnapshot {
        self.publisher.publish(&self.state);

        while !self.state.is_settled() {
            let wants_tick = self.scheduler.should_tick(&self.state);
            let wants_event = !self.reader_done;

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    if self.state.cancel() {
                        info!(
                            session = %self.state.id(),
                            revealed = self.state.reveal_index(),
                            "insight session cancelled"
                        );
                    }
                    self.publisher.publish(&self.state);
                    break;
                }
                event = self.events.recv(), if wants_event => match event {
                    Some(event) => self.handle_event(event),
                    None => self.reader_vanished(),
                },
                () = self.scheduler.tick(), if wants_tick => {
                    if self.scheduler.advance(&mut self.state) == TickOutcome::Finished {
                        info!(
                            session = %self.state.id(),
                            chars = self.state.reveal_index(),
                            "insight revealed"
                        );
                    }
                }
            }

            self.publisher.publish(&self.state);
        }

        self.shutdown().await;
        self.state.snapshot()
    }

    fn handle_event(&mut self, event: ReaderEvent) {
        if event.session != *self.state.id() {
            warn!(
                session = %self.state.id(),
                stale = %event.session,
                "discarding event from another session"
            );
            return;
        }

        match event.kind {
            ReaderEventKind::Chunk(chunk) => {
                trace!(session = %self.state.id(), chars = chunk.char_count(), "chunk");
                if !self.state.append(&chunk) {
                    debug!(session = %self.state.id(), status = %self.state.status(), "chunk dropped");
                }
            }
            ReaderEventKind::Finished => {
                self.reader_done = true;
                debug!(
                    session = %self.state.id(),
                    chars = self.state.buffered_chars(),
                    "insight stream complete"
                );
                if self.state.complete_stream() && !self.state.has_unrevealed() {
                    self.state.finish();
                }
            }
            ReaderEventKind::Failed(err) => {
                self.reader_done = true;
                ErrorSink::absorb(&mut self.state, &err);
            }
        }
    }

    fn reader_vanished(&mut self) {
        self.reader_done = true;
        let err = InsightError::from(TransportError::Dropped(
            "reader stopped without a final signal".to_string(),
        ));
        ErrorSink::absorb(&mut self.state, &err);
    }

    /// Stop the reader and wait for it, so nothing of this session outlives it
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.events.close();

        if let Err(err) = (&mut self.reader).await {
            if err.is_panic() {
                error!(session = %self.state.id(), "insight reader panicked");
            }
        }
    }
}
