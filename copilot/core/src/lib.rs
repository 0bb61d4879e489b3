//! Copilot Core - Headless Insight Streaming for the Finance Copilot
//!
//! This crate holds everything the finance copilot does that is not drawing
//! pixels: the insight stream consumer, the REST client for expenses, income
//! and summaries, and configuration loading. Any surface (terminal, web view,
//! test harness) drives it through the same handful of types.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Display layer                            │
//! │               (copilot CLI, tests, any other surface)             │
//! └───────────────┬──────────────────────────────────▲───────────────┘
//!                 │ start() / cancel()               │ SessionSnapshot
//! ┌───────────────┼──────────────────────────────────┼───────────────┐
//! │               ▼          InsightSession          │               │
//! │   ┌──────────────────────────────────────────────┴─────────┐     │
//! │   │                 SessionDriver (one task)                │     │
//! │   │   ┌──────────────────┐        ┌──────────────────────┐  │     │
//! │   │   │  StreamReader    │ chunks │  PlaybackScheduler   │  │     │
//! │   │   │  (Utf8Decoder)   │───────▶│  (one Interval)      │  │     │
//! │   │   └────────┬─────────┘        └──────────────────────┘  │     │
//! │   └────────────┼──────────────────────────────────────────┘     │
//! │                ▼                                                 │
//! │        InsightTransport (HttpTransport over reqwest)             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`InsightSession`]: owns the single active insight session
//! - [`SessionSnapshot`]: read-only view published on every state change
//! - [`InsightTransport`]: seam between the session and the network
//! - [`InsightError`]: failure taxonomy surfaced to the user
//! - [`FinanceApi`]: expenses, income and summary endpoints
//! - [`CopilotConfig`]: layered configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use copilot_core::{load_config, Credential, InsightRequest, InsightSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let mut session = InsightSession::http(&config)?;
//!
//!     let request = InsightRequest::new(config.api.user_id)
//!         .with_credential(Credential::new("token-from-login"));
//!     session.start(request).await;
//!
//!     let snapshot = session.wait().await;
//!     println!("{}", snapshot.display_text());
//!     Ok(())
//! }
//! ```
//!
//! # No UI Dependencies
//!
//! Nothing here depends on a terminal or widget library. Surfaces observe
//! [`SessionSnapshot`] values and render them however they like.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod streaming;

pub use api::{
    financial_score, Expense, FinanceApi, HealthStatus, NewExpense, NewIncome, Summary,
};
pub use config::{
    apply_env_from, default_config_path, load_config, load_config_from_path, ApiConfig,
    ConfigError, ConfigOverrides, ConfigSource, CopilotConfig,
};
pub use error::{ErrorKind, ErrorSink, InsightError, TransportError};
pub use session::{
    InsightId, InsightSession, SessionSettings, SessionSnapshot, SessionState, SessionStatus,
};
pub use streaming::{
    ByteStream, Credential, DecodeError, EndpointScope, HttpTransport, InsightRequest,
    InsightTransport, PlaybackConfig, PlaybackMode, PlaybackScheduler, ReaderEvent,
    ReaderEventKind, StreamReader, TextChunk, Utf8Decoder,
};
