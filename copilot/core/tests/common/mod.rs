//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use copilot_core::{
    ByteStream, InsightError, InsightRequest, InsightTransport, PlaybackConfig, SessionSettings,
    SessionSnapshot,
};

/// One step of a scripted response body
#[derive(Clone, Debug)]
pub enum Step {
    /// Deliver raw bytes as one block
    Bytes(Vec<u8>),
    /// Deliver UTF-8 text as one block
    Text(&'static str),
    /// Pause before the next step
    Wait(Duration),
    /// Fail the stream
    Fail(InsightError),
    /// Never produce anything again
    Hang,
}

/// What one `open()` call does
#[derive(Clone, Debug)]
pub enum Script {
    /// Stream these steps, then end
    Body(Vec<Step>),
    /// Fail before any body byte
    Refuse(InsightError),
    /// Accept the request and never answer
    Silent,
}

/// Transport that replays one script per `open()`
///
/// Counts opens and tracks how many streams are still alive, so tests can
/// check that cancelled sessions release their stream.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opens: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    /// A single body made of text blocks
    pub fn texts(parts: &[&'static str]) -> Arc<Self> {
        Self::new(vec![Script::Body(
            parts.iter().map(|&p| Step::Text(p)).collect(),
        )])
    }

    /// Number of `open()` calls so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet dropped
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InsightTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open(&self, _request: &InsightRequest) -> Result<ByteStream, InsightError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Body(Vec::new()));

        let steps = match script {
            Script::Refuse(err) => return Err(err),
            Script::Silent => return futures::future::pending().await,
            Script::Body(steps) => VecDeque::from(steps),
        };

        let guard = LiveGuard::new(&self.live);
        let body = stream::unfold((steps, guard), |(mut steps, guard)| async move {
            loop {
                match steps.pop_front()? {
                    Step::Bytes(bytes) => return Some((Ok(Bytes::from(bytes)), (steps, guard))),
                    Step::Text(text) => {
                        return Some((Ok(Bytes::from_static(text.as_bytes())), (steps, guard)))
                    }
                    Step::Fail(err) => return Some((Err(err), (steps, guard))),
                    Step::Wait(duration) => tokio::time::sleep(duration).await,
                    Step::Hang => futures::future::pending::<()>().await,
                }
            }
        });
        Ok(body.boxed())
    }
}

/// Settings with the given per-character delay and no read timeout
pub fn settings(char_delay_ms: u64) -> SessionSettings {
    SessionSettings::default()
        .with_playback(PlaybackConfig::default().with_char_delay(Duration::from_millis(char_delay_ms)))
        .with_read_timeout(None)
}

/// Collect every snapshot the receiver observes until the sender is gone
pub fn record(mut rx: watch::Receiver<SessionSnapshot>) -> JoinHandle<Vec<SessionSnapshot>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow_and_update().clone());
        }
        seen
    })
}
