//! Insight Session Management
//!
//! [`InsightSession`] owns the single active-session slot. Starting a new
//! insight cancels the previous one and waits for its driver task to finish
//! before the new one enters `Requesting`, so two sessions never run at the
//! same time and a superseded session can never mutate what the user sees.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use copilot_core::{InsightRequest, InsightSession, SessionSettings};
//!
//! let mut session = InsightSession::new(Arc::new(transport), SessionSettings::default());
//! let mut snapshots = session.subscribe();
//!
//! session.start(InsightRequest::new(1).with_credential(token)).await;
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     render(&snapshot);
//!     if snapshot.is_settled() {
//!         break;
//!     }
//! }
//! ```

mod driver;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use state::{InsightId, SessionSnapshot, SessionState, SessionStatus};

use crate::config::CopilotConfig;
use crate::streaming::{
    HttpTransport, InsightRequest, InsightTransport, PlaybackConfig, PlaybackScheduler,
    StreamReader,
};
use driver::{SessionDriver, SnapshotPublisher};

/// Tunables for sessions created by an [`InsightSession`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Reveal cadence and mode
    pub playback: PlaybackConfig,
    /// Longest wait for the next block of bytes (None = unbounded)
    pub read_timeout: Option<Duration>,
    /// Reader-to-driver channel capacity
    pub channel_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            read_timeout: Some(Duration::from_secs(60)),
            channel_capacity: 64,
        }
    }
}

impl SessionSettings {
    /// Settings taken from the loaded configuration
    #[must_use]
    pub fn from_config(config: &CopilotConfig) -> Self {
        Self {
            playback: config.playback,
            read_timeout: config.api.read_timeout,
            ..Self::default()
        }
    }

    /// Set playback settings
    #[must_use]
    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    /// Set the idle read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// The session occupying the active slot
struct ActiveSession {
    id: InsightId,
    cancel: CancellationToken,
    /// Driver task (None once joined)
    handle: Option<JoinHandle<SessionSnapshot>>,
    publisher: SnapshotPublisher,
}

impl ActiveSession {
    /// Wait for the driver to exit
    async fn join(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        if let Err(err) = handle.await {
            error!(session = %self.id, error = %err, "insight session task failed");
            self.publisher.publish_crash();
        }
        self.handle = None;
    }

    /// Cancel and wait until the reader and timer are gone
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.join().await;
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        // Owner went away without awaiting; the driver stops at its next suspension point
        self.cancel.cancel();
    }
}

/// Owner of the one insight session a surface may have running
pub struct InsightSession {
    transport: Arc<dyn InsightTransport>,
    settings: SessionSettings,
    snapshots: watch::Sender<SessionSnapshot>,
    active: Option<ActiveSession>,
}

impl InsightSession {
    /// Create with an explicit transport
    #[must_use]
    pub fn new(transport: Arc<dyn InsightTransport>, settings: SessionSettings) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            transport,
            settings,
            snapshots,
            active: None,
        }
    }

    /// Create against the configured HTTP backend
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn http(config: &CopilotConfig) -> Result<Self, reqwest::Error> {
        let transport = HttpTransport::from_config(&config.api)?;
        Ok(Self::new(
            Arc::new(transport),
            SessionSettings::from_config(config),
        ))
    }

    /// Settings applied to new sessions
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Change settings; takes effect at the next `start()`
    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    /// Start a new insight, superseding any running one
    ///
    /// The previous session is cancelled and fully stopped before this one
    /// begins. Always safe to call again, including after a failure.
    pub async fn start(&mut self, request: InsightRequest) -> InsightId {
        if let Some(previous) = self.active.as_ref() {
            debug!(session = %previous.id, "superseding insight session");
        }
        self.cancel().await;

        let id = InsightId::new();
        let cancel = CancellationToken::new();

        let mut state = SessionState::new(id.clone());
        state.begin();
        self.snapshots.send_replace(state.snapshot());

        let reader = StreamReader::new(id.clone(), cancel.child_token(), self.settings.read_timeout);
        let (events, reader_handle) = reader.spawn(
            Arc::clone(&self.transport),
            request,
            self.settings.channel_capacity,
        );

        let publisher = SnapshotPublisher::new(id.clone(), self.snapshots.clone());
        let driver = SessionDriver::new(
            state,
            PlaybackScheduler::new(self.settings.playback),
            events,
            reader_handle,
            cancel.clone(),
            publisher.clone(),
        );
        let handle = tokio::spawn(driver.run());

        info!(
            session = %id,
            transport = self.transport.name(),
            char_delay = ?self.settings.playback.char_delay,
            "insight session started"
        );

        self.active = Some(ActiveSession {
            id: id.clone(),
            cancel,
            handle: Some(handle),
            publisher,
        });
        id
    }

    /// Cancel the active session and wait for it to stop
    ///
    /// Idempotent. Returns `true` only if a running session was actually
    /// interrupted; cancelling a finished session changes nothing.
    pub async fn cancel(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };

        let was_running = !self.snapshots.borrow().is_settled();
        active.shutdown().await;
        was_running && self.snapshots.borrow().cancelled
    }

    /// Wait until the active session is done, failed, or cancelled
    pub async fn wait(&mut self) -> SessionSnapshot {
        if let Some(active) = self.active.as_mut() {
            active.join().await;
        }
        self.snapshot()
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Snapshots as a stream, starting with the current one
    #[must_use]
    pub fn snapshots(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Id of the session in the active slot
    #[must_use]
    pub fn active_id(&self) -> Option<&InsightId> {
        self.active.as_ref().map(|a| &a.id)
    }

    /// Whether a session is requesting, streaming or revealing
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.snapshots.borrow().status.is_active()
    }
}
