#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Alpaca Streaming Client
//!
//! Persistent client for Alpaca's real-time WebSocket feeds: market data
//! (trades, quotes, bars) and order/trade-execution events. Each stream is
//! one long-lived connection owned by a spawned actor task that handles
//! authentication, desired-state subscription replay, heartbeats and
//! bounded exponential-backoff reconnection.
//!
//! # Modules
//!
//! - `config`: Credentials, endpoints and connection tuning
//! - `messages`: Wire types for both stream protocols
//! - `codec`: JSON frame decoding
//! - `auth`: Auth handshake and credential redaction
//! - `reconnect`: Exponential backoff with jitter
//! - `subscription`: Desired-state subscription registry
//! - `dispatch`: Panic-isolated event delivery
//! - `client`: Shared connection vocabulary
//! - `market_data`: Market data stream actor
//! - `order_updates`: Order events stream actor
//!
//! # Example
//!
//! ```no_run
//! use alpaca_stream::{
//!     Credentials, DomainEvent, MarketDataStream, StreamConfig, SubscriptionSpec,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamConfig::new(Credentials::new("key", "secret")?);
//! let handle = MarketDataStream::start(config, |event: DomainEvent| {
//!     if let DomainEvent::Trade(trade) = event {
//!         println!("{} @ {}", trade.symbol, trade.price);
//!     }
//! })?;
//!
//! handle.subscribe(SubscriptionSpec::new().trades(["AAPL"]));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Credentials, endpoints and connection tuning.
pub mod config;

/// Wire types for both stream protocols.
pub mod messages;

/// JSON frame decoding.
pub mod codec;

/// Auth handshake and credential redaction.
pub mod auth;

/// Exponential backoff with jitter.
pub mod reconnect;

/// Desired-state subscription registry.
pub mod subscription;

/// Panic-isolated event delivery.
pub mod dispatch;

/// Shared connection vocabulary.
pub mod client;

/// Market data stream actor.
pub mod market_data;

/// Order events stream actor.
pub mod order_updates;

// =============================================================================
// Re-exports
// =============================================================================

// Configuration
pub use config::{
    ConfigError, Credentials, DataFeed, Environment, REDACTED, StreamConfig, StreamSettings,
};

// Connection vocabulary
pub use client::{ConnectionState, StreamError};

// Stream clients
pub use market_data::{MarketDataHandle, MarketDataStream};
pub use order_updates::{OrderUpdatesHandle, OrderUpdatesStream};

// Subscriptions and events
pub use dispatch::{DomainEvent, EventHandler};
pub use subscription::SubscriptionSpec;

// Wire types (for integration tests and advanced matching)
pub use messages::{
    BarMessage, OrderEventType, OrderSnapshot, OrderUpdateData, QuoteMessage, StreamMessage,
    TradeMessage,
};
