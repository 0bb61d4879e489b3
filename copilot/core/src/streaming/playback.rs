//! Playback Scheduler
//!
//! Reveals buffered insight text one character per tick so a fast network
//! does not dump a wall of text at once.
//!
//! The scheduler owns a single [`tokio::time::Interval`], created on the
//! first tick and dropped with the scheduler. It never touches session state
//! on its own: the session driver awaits [`PlaybackScheduler::tick`] inside
//! its `select!` loop and applies [`PlaybackScheduler::advance`] to the state
//! it owns, so a cancelled session's timer simply stops being polled.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Interval, MissedTickBehavior};

use crate::session::{SessionState, SessionStatus};

/// Default per-character delay
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(30);

/// When reveal may start
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Reveal while bytes are still arriving
    #[default]
    Live,
    /// Hold reveal until the stream has completed
    Buffered,
}

impl FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "buffered" | "after_complete" => Ok(Self::Buffered),
            other => Err(format!("unknown playback mode '{other}'")),
        }
    }
}

/// Playback cadence settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Delay between characters (zero = reveal everything at once)
    pub char_delay: Duration,
    /// When reveal may start
    pub mode: PlaybackMode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            char_delay: DEFAULT_CHAR_DELAY,
            mode: PlaybackMode::Live,
        }
    }
}

impl PlaybackConfig {
    /// Reveal everything as soon as it is allowed
    #[must_use]
    pub fn instant() -> Self {
        Self {
            char_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Set the per-character delay
    #[must_use]
    pub fn with_char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = delay;
        self
    }

    /// Set the playback mode
    #[must_use]
    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Result of applying one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// This many characters became visible
    Advanced(usize),
    /// Final character shown, session is `Done`
    Finished,
    /// Nothing to reveal yet
    Idle,
}

/// Fixed-cadence reveal timer for one session
pub struct PlaybackScheduler {
    config: PlaybackConfig,
    /// The session's only timer (None until first tick, and for instant playback)
    ticker: Option<Interval>,
}

impl PlaybackScheduler {
    /// Create a scheduler; no timer runs until the first tick
    #[must_use]
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            ticker: None,
        }
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Whether every tick reveals all pending text
    #[must_use]
    pub fn is_instant(&self) -> bool {
        self.config.char_delay.is_zero()
    }

    /// Whether the driver should wait on a tick for `state`
    ///
    /// False while the scheduler has caught up with a stream that is still
    /// running: the scheduler idles until more text or a final signal
    /// arrives instead of spinning.
    #[must_use]
    pub fn should_tick(&self, state: &SessionState) -> bool {
        match state.status() {
            SessionStatus::Streaming => {
                self.config.mode == PlaybackMode::Live && state.has_unrevealed()
            }
            SessionStatus::Revealing => true,
            _ => false,
        }
    }

    /// Wait for the next tick
    pub async fn tick(&mut self) {
        if self.is_instant() {
            return;
        }

        let delay = self.config.char_delay;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(delay);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
    }

    /// Apply one tick to `state`
    ///
    /// Reveals one character (all pending characters for instant playback)
    /// and moves a `Revealing` session to `Done` once everything is visible.
    pub fn advance(&self, state: &mut SessionState) -> TickOutcome {
        if !self.should_tick(state) {
            return TickOutcome::Idle;
        }

        let step = if self.is_instant() {
            state.unrevealed_count()
        } else {
            1
        };
        let revealed = state.reveal(step);

        if state.status() == SessionStatus::Revealing && !state.has_unrevealed() {
            state.finish();
            return TickOutcome::Finished;
        }

        if revealed == 0 {
            TickOutcome::Idle
        } else {
            TickOutcome::Advanced(revealed)
        }
    }
}
