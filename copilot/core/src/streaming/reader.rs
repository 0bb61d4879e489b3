//! Stream Reader
//!
//! Pulls blocks from an [`InsightTransport`], decodes them, and forwards the
//! text to the session driver over a channel. Runs as its own task so the
//! driver only ever waits on a channel and a timer.
//!
//! # Signals
//!
//! A reader emits zero or more [`ReaderEventKind::Chunk`] events followed by
//! exactly one of [`ReaderEventKind::Finished`] or [`ReaderEventKind::Failed`],
//! then stops. A cancelled reader stops at its next suspension point and
//! emits nothing further.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::decoder::Utf8Decoder;
use super::transport::{ByteStream, InsightRequest, InsightTransport};
use crate::error::{InsightError, TransportError};
use crate::session::InsightId;

/// An immutable fragment of decoded text from one transport read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk(String);

impl TextChunk {
    /// Wrap decoded text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// Whether the chunk is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Kind of reader event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderEventKind {
    /// Decoded text, in arrival order
    Chunk(TextChunk),
    /// End-of-stream; the buffer is complete
    Finished,
    /// The stream failed; nothing follows
    Failed(InsightError),
}

/// An event from a reader, tagged with the session that owns it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderEvent {
    /// Session this event belongs to
    pub session: InsightId,
    /// What happened
    pub kind: ReaderEventKind,
}

/// Reads and decodes one insight stream
pub struct StreamReader {
    /// Owning session
    session: InsightId,
    /// Decoder with carry between blocks
    decoder: Utf8Decoder,
    /// Longest allowed wait for the next block (None = unbounded)
    read_timeout: Option<Duration>,
    /// Session cancellation, checked at every suspension point
    cancel: CancellationToken,
}

impl StreamReader {
    /// Create a reader for `session`
    #[must_use]
    pub fn new(
        session: InsightId,
        cancel: CancellationToken,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            session,
            decoder: Utf8Decoder::new(),
            read_timeout,
            cancel,
        }
    }

    /// Spawn the reader as a task
    ///
    /// Returns the event receiver and the task handle. The task ends after
    /// its final signal, on cancellation, or when the receiver is closed.
    pub fn spawn(
        self,
        transport: Arc<dyn InsightTransport>,
        request: InsightRequest,
        capacity: usize,
    ) -> (mpsc::Receiver<ReaderEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run(transport, request, tx));
        (rx, handle)
    }

    /// Open the transport and pump it until a final signal
    pub async fn run(
        mut self,
        transport: Arc<dyn InsightTransport>,
        request: InsightRequest,
        tx: mpsc::Sender<ReaderEvent>,
    ) {
        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(session = %self.session, "reader cancelled before the stream opened");
                return;
            }
            result = Self::open_stream(transport.as_ref(), &request, self.read_timeout) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                self.emit(&tx, ReaderEventKind::Failed(err)).await;
                return;
            }
        };

        loop {
            let block = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!(
                        session = %self.session,
                        decoded = self.decoder.decoded_bytes(),
                        "reader cancelled mid-stream"
                    );
                    return;
                }
                block = Self::next_block(&mut stream, self.read_timeout) => block,
            };

            let kind = match block {
                Ok(Some(bytes)) => match self.decoder.decode(&bytes) {
                    Ok(text) if text.is_empty() => {
                        trace!(session = %self.session, pending = self.decoder.pending(), "block held in carry");
                        continue;
                    }
                    Ok(text) => {
                        if !self.emit(&tx, ReaderEventKind::Chunk(TextChunk::new(text))).await {
                            return;
                        }
                        // Text ahead of an invalid byte is delivered before the failure
                        match self.decoder.failure() {
                            Some(err) => ReaderEventKind::Failed(err.clone().into()),
                            None => continue,
                        }
                    }
                    Err(err) => ReaderEventKind::Failed(err.into()),
                },
                Ok(None) => match self.decoder.finish() {
                    Ok(()) => ReaderEventKind::Finished,
                    Err(err) => ReaderEventKind::Failed(err.into()),
                },
                Err(err) => ReaderEventKind::Failed(err),
            };

            // Final signal: Finished or Failed, exactly once
            self.emit(&tx, kind).await;
            return;
        }
    }

    /// Open the transport, bounded by the same timeout as a block read
    ///
    /// Covers a backend that accepts the connection but never answers.
    async fn open_stream(
        transport: &dyn InsightTransport,
        request: &InsightRequest,
        read_timeout: Option<Duration>,
    ) -> Result<ByteStream, InsightError> {
        match read_timeout {
            Some(limit) => tokio::time::timeout(limit, transport.open(request))
                .await
                .map_err(|_| timed_out("no response", limit))?,
            None => transport.open(request).await,
        }
    }

    /// Await the next block, bounded by the idle timeout
    async fn next_block(
        stream: &mut ByteStream,
        read_timeout: Option<Duration>,
    ) -> Result<Option<bytes::Bytes>, InsightError> {
        let next = match read_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| timed_out("no data", limit))?,
            None => stream.next().await,
        };
        next.transpose()
    }

    /// Send an event unless the session was cancelled
    ///
    /// Returns `false` when the reader should stop.
    async fn emit(&self, tx: &mpsc::Sender<ReaderEvent>, kind: ReaderEventKind) -> bool {
        let event = ReaderEvent {
            session: self.session.clone(),
            kind,
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = tx.send(event) => sent.is_ok(),
        }
    }
}

fn timed_out(what: &str, limit: Duration) -> InsightError {
    TransportError::TimedOut(format!("{what} for {} ms", limit.as_millis())).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;

    use crate::streaming::decoder::DecodeError;

    struct BlocksTransport {
        blocks: Vec<Result<Vec<u8>, InsightError>>,
    }

    #[async_trait]
    impl InsightTransport for BlocksTransport {
        fn name(&self) -> &'static str {
            "blocks"
        }

        async fn open(&self, _request: &InsightRequest) -> Result<ByteStream, InsightError> {
            let blocks: Vec<_> = self
                .blocks
                .iter()
                .cloned()
                .map(|b| b.map(Bytes::from))
                .collect();
            Ok(stream::iter(blocks).boxed())
        }
    }

    struct RefusingTransport;

    #[async_trait]
    impl InsightTransport for RefusingTransport {
        fn name(&self) -> &'static str {
            "refusing"
        }

        async fn open(&self, _request: &InsightRequest) -> Result<ByteStream, InsightError> {
            Err(InsightError::from_status(401, ""))
        }
    }

    async fn collect(
        transport: Arc<dyn InsightTransport>,
        cancel: CancellationToken,
    ) -> Vec<ReaderEventKind> {
        let session = InsightId::new();
        let reader = StreamReader::new(session.clone(), cancel, None);
        let (mut rx, handle) = reader.spawn(transport, InsightRequest::new(1), 8);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.session, session);
            kinds.push(event.kind);
        }
        handle.await.unwrap();
        kinds
    }

    #[tokio::test]
    async fn test_chunks_then_finished() {
        let transport = Arc::new(BlocksTransport {
            blocks: vec![Ok(b"Your ".to_vec()), Ok(b"savings".to_vec())],
        });

        let kinds = collect(transport, CancellationToken::new()).await;
        assert_eq!(
            kinds,
            vec![
                ReaderEventKind::Chunk(TextChunk::new("Your ")),
                ReaderEventKind::Chunk(TextChunk::new("savings")),
                ReaderEventKind::Finished,
            ]
        );
    }

    #[tokio::test]
    async fn test_split_character_emitted_once() {
        let rupee = "₹".as_bytes().to_vec();
        let transport = Arc::new(BlocksTransport {
            blocks: vec![Ok(rupee[..2].to_vec()), Ok(rupee[2..].to_vec())],
        });

        let kinds = collect(transport, CancellationToken::new()).await;
        assert_eq!(
            kinds,
            vec![
                ReaderEventKind::Chunk(TextChunk::new("₹")),
                ReaderEventKind::Finished
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_is_final() {
        let dropped = InsightError::from(TransportError::Dropped("reset".into()));
        let transport = Arc::new(BlocksTransport {
            blocks: vec![
                Ok(b"Partial ".to_vec()),
                Err(dropped.clone()),
                Ok(b"never seen".to_vec()),
            ],
        });

        let kinds = collect(transport, CancellationToken::new()).await;
        assert_eq!(
            kinds,
            vec![
                ReaderEventKind::Chunk(TextChunk::new("Partial ")),
                ReaderEventKind::Failed(dropped),
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_tail_fails() {
        let rupee = "₹".as_bytes().to_vec();
        let transport = Arc::new(BlocksTransport {
            blocks: vec![Ok(b"ok".to_vec()), Ok(rupee[..1].to_vec())],
        });

        let kinds = collect(transport, CancellationToken::new()).await;
        assert!(matches!(
            kinds.last(),
            Some(ReaderEventKind::Failed(InsightError::Decode(_)))
        ));
    }

    #[tokio::test]
    async fn test_open_failure_reported() {
        let kinds = collect(Arc::new(RefusingTransport), CancellationToken::new()).await;
        assert_eq!(kinds.len(), 1);
        assert!(matches!(kinds[0], ReaderEventKind::Failed(InsightError::Auth(_))));
    }

    #[tokio::test]
    async fn test_cancelled_reader_emits_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let transport = Arc::new(BlocksTransport {
            blocks: vec![Ok(b"late".to_vec())],
        });

        let kinds = collect(transport, cancel).await;
        assert!(kinds.is_empty());
    }

    #[tokio::test]
    async fn test_text_before_invalid_byte_is_emitted() {
        let transport = Arc::new(BlocksTransport {
            blocks: vec![Ok(b"abc\xFF".to_vec()), Ok(b"never seen".to_vec())],
        });

        let kinds = collect(transport, CancellationToken::new()).await;
        assert_eq!(
            kinds,
            vec![
                ReaderEventKind::Chunk(TextChunk::new("abc")),
                ReaderEventKind::Failed(InsightError::Decode(DecodeError::Invalid { offset: 3 })),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_open_times_out() {
        struct SilentTransport;

        #[async_trait]
        impl InsightTransport for SilentTransport {
            fn name(&self) -> &'static str {
                "silent"
            }

            async fn open(&self, _request: &InsightRequest) -> Result<ByteStream, InsightError> {
                futures::future::pending().await
            }
        }

        let reader = StreamReader::new(
            InsightId::new(),
            CancellationToken::new(),
            Some(Duration::from_millis(500)),
        );
        let (mut rx, _handle) = reader.spawn(Arc::new(SilentTransport), InsightRequest::new(1), 4);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.kind,
            ReaderEventKind::Failed(InsightError::Transport(TransportError::TimedOut(_)))
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_read_times_out() {
        struct StallingTransport;

        #[async_trait]
        impl InsightTransport for StallingTransport {
            fn name(&self) -> &'static str {
                "stalling"
            }

            async fn open(&self, _request: &InsightRequest) -> Result<ByteStream, InsightError> {
                Ok(stream::pending::<Result<Bytes, InsightError>>().boxed())
            }
        }

        let session = InsightId::new();
        let reader = StreamReader::new(
            session,
            CancellationToken::new(),
            Some(Duration::from_millis(500)),
        );
        let (mut rx, _handle) = reader.spawn(Arc::new(StallingTransport), InsightRequest::new(1), 4);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.kind,
            ReaderEventKind::Failed(InsightError::Transport(TransportError::TimedOut(_)))
        ));
        assert!(rx.recv().await.is_none());
    }
}
