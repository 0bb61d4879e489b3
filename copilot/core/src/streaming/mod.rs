//! Insight Stream Consumption
//!
//! The pieces that turn a chunked HTTP body into text a user watches being
//! typed out:
//!
//! ```text
//! InsightTransport ──bytes──▶ StreamReader ──TextChunk──▶ SessionDriver
//!                              (Utf8Decoder)                   │
//!                                                              ▼
//!                                                     PlaybackScheduler
//!                                                   (one char per tick)
//! ```
//!
//! - [`InsightTransport`] opens the byte stream ([`HttpTransport`] in
//!   production, scripted transports in tests)
//! - [`StreamReader`] runs as its own task, decoding bytes and sending
//!   [`ReaderEvent`]s tagged with the session id
//! - [`PlaybackScheduler`] reveals buffered text at a fixed cadence,
//!   independent of how fast the network is
//!
//! Neither component owns session state; the session driver in
//! [`crate::session`] does.

mod decoder;
mod playback;
mod reader;
mod transport;

pub use decoder::{DecodeError, Utf8Decoder};
pub use playback::{PlaybackConfig, PlaybackMode, PlaybackScheduler, TickOutcome};
pub use reader::{ReaderEvent, ReaderEventKind, StreamReader, TextChunk};
pub use transport::{
    ByteStream, Credential, EndpointScope, HttpTransport, InsightRequest, InsightTransport,
};
