//! Wire Message Types
//!
//! Serde types for the frames exchanged with Alpaca's WebSocket streams.
//!
//! # Message Shapes
//!
//! ## Control (market data stream)
//! - `{"T":"success","msg":"connected"|"authenticated"}`
//! - `{"T":"error","code":401,"msg":"not authenticated"}`
//! - `{"T":"subscription","trades":[...],"quotes":[...],"bars":[...]}`
//!
//! ## Market data (compact keys)
//! - Trades `"T":"t"`, quotes `"T":"q"`, bars `"T":"b"`
//!
//! ## Order updates stream
//! - `{"stream":"authorization","data":{"status":"authorized",...}}`
//! - `{"stream":"listening","data":{"streams":["trade_updates"]}}`
//! - `{"stream":"trade_updates","data":{"event":"fill","order":{...},...}}`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Control Messages
// =============================================================================

/// Success message indicating connection or authentication succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    /// Message type (always "success").
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Success message: "connected" or "authenticated".
    pub msg: SuccessKind,
}

/// Kind of success message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessKind {
    /// Initial connection established.
    Connected,
    /// Authentication successful.
    Authenticated,
}

/// Error message with code and description.
///
/// # Error Codes
/// - 400: Invalid syntax
/// - 401: Not authenticated
/// - 402: Auth failed
/// - 403: Already authenticated
/// - 404: Auth timeout
/// - 405: Symbol limit exceeded
/// - 406: Connection limit exceeded
/// - 407: Slow client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Message type (always "error").
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Error code.
    pub code: i32,

    /// Error message.
    pub msg: String,
}

impl ErrorMessage {
    /// Check if this is an authentication error.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.code, 401..=404)
    }
}

/// Subscription confirmation, sent after a subscribe/unsubscribe action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// Message type (always "subscription").
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Confirmed trade symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<String>,

    /// Confirmed quote symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<String>,

    /// Confirmed bar symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bars: Vec<String>,
}

// =============================================================================
// Market Data Messages
// =============================================================================

/// Real-time trade tick.
///
/// Only symbol, price and size are guaranteed by the feed; the remaining
/// fields default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Message type (always "t").
    #[serde(rename = "T", default)]
    pub msg_type: String,

    /// Ticker symbol (e.g., "AAPL").
    #[serde(rename = "S")]
    pub symbol: String,

    /// Trade timestamp (RFC-3339 with nanosecond precision).
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Trade size (shares).
    #[serde(rename = "s")]
    pub size: u64,

    /// Exchange code where the trade executed.
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Trade ID (unique per exchange per day).
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Trade condition codes.
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,

    /// Tape: "A" (NYSE), "B" (ARCA/regional), "C" (NASDAQ).
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<String>,
}

/// Real-time NBBO quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMessage {
    /// Message type (always "q").
    #[serde(rename = "T", default)]
    pub msg_type: String,

    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Quote timestamp.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Bid price.
    #[serde(rename = "bp")]
    pub bid_price: Decimal,

    /// Bid size (round lots).
    #[serde(rename = "bs")]
    pub bid_size: u64,

    /// Bid exchange code.
    #[serde(rename = "bx", default, skip_serializing_if = "Option::is_none")]
    pub bid_exchange: Option<String>,

    /// Ask price.
    #[serde(rename = "ap")]
    pub ask_price: Decimal,

    /// Ask size (round lots).
    #[serde(rename = "as")]
    pub ask_size: u64,

    /// Ask exchange code.
    #[serde(rename = "ax", default, skip_serializing_if = "Option::is_none")]
    pub ask_exchange: Option<String>,

    /// Quote condition codes.
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,

    /// Tape.
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<String>,
}

/// Real-time OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarMessage {
    /// Message type (always "b").
    #[serde(rename = "T", default)]
    pub msg_type: String,

    /// Ticker symbol.
    #[serde(rename = "S")]
    pub symbol: String,

    /// Bar timestamp (start of the bar period).
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Open price.
    #[serde(rename = "o")]
    pub open: Decimal,

    /// High price.
    #[serde(rename = "h")]
    pub high: Decimal,

    /// Low price.
    #[serde(rename = "l")]
    pub low: Decimal,

    /// Close price.
    #[serde(rename = "c")]
    pub close: Decimal,

    /// Volume (shares).
    #[serde(rename = "v")]
    pub volume: u64,

    /// Number of trades in the bar.
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<u64>,

    /// Volume-weighted average price.
    #[serde(rename = "vw", default, skip_serializing_if = "Option::is_none")]
    pub vwap: Option<Decimal>,
}

// =============================================================================
// Order Updates Stream Messages
// =============================================================================

/// Authorization response from the order updates stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    /// Stream name (always "authorization").
    pub stream: String,

    /// Authorization data.
    pub data: AuthorizationData,
}

/// Authorization response data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationData {
    /// Status: "authorized" or "unauthorized".
    pub status: String,

    /// Action that was authorized (e.g., "authenticate").
    #[serde(default)]
    pub action: Option<String>,
}

impl AuthorizationMessage {
    /// Check if authorization succeeded.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.data.status == "authorized"
    }
}

/// Listening confirmation from the order updates stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningMessage {
    /// Stream name (always "listening").
    pub stream: String,

    /// Listening data.
    pub data: ListeningData,
}

/// Listening confirmation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningData {
    /// List of active streams.
    pub streams: Vec<String>,
}

/// Order lifecycle event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    /// Order received.
    New,
    /// Order completely filled.
    Fill,
    /// Order partially filled.
    PartialFill,
    /// Order canceled.
    Canceled,
    /// Order expired.
    Expired,
    /// Order done for the day.
    DoneForDay,
    /// Order replaced by another order.
    Replaced,
    /// Order rejected.
    Rejected,
    /// Order pending submission.
    PendingNew,
    /// Order stopped.
    Stopped,
    /// Order cancel pending.
    PendingCancel,
    /// Order replace pending.
    PendingReplace,
    /// Order calculated.
    Calculated,
    /// Order suspended.
    Suspended,
    /// Order replace was rejected.
    OrderReplaceRejected,
    /// Order cancel was rejected.
    OrderCancelRejected,
    /// Event type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

/// Snapshot of the order an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Unique order ID.
    pub id: String,

    /// Client-provided order ID.
    #[serde(default)]
    pub client_order_id: Option<String>,

    /// Ticker symbol.
    pub symbol: String,

    /// Order side.
    #[serde(default)]
    pub side: Option<OrderSide>,

    /// Order type (market, limit, ...).
    #[serde(rename = "type", default)]
    pub order_type: Option<String>,

    /// Order quantity (may be absent for notional orders).
    #[serde(default)]
    pub qty: Option<String>,

    /// Filled quantity.
    #[serde(default)]
    pub filled_qty: Option<String>,

    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,

    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<String>,

    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<String>,

    /// Current order status.
    #[serde(default)]
    pub status: Option<String>,

    /// Order creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Order update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateData {
    /// Event type (fill, canceled, ...).
    pub event: OrderEventType,

    /// Snapshot of the order.
    pub order: OrderSnapshot,

    /// Event timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Execution ID (fill events).
    #[serde(default)]
    pub execution_id: Option<String>,

    /// Position quantity after the fill.
    #[serde(default)]
    pub position_qty: Option<String>,

    /// Fill price (fill events).
    #[serde(default)]
    pub price: Option<String>,

    /// Fill quantity (fill events).
    #[serde(default)]
    pub qty: Option<String>,
}

/// Order update message from the order events stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateMessage {
    /// Stream name (always `trade_updates`).
    pub stream: String,

    /// Update payload.
    pub data: OrderUpdateData,
}

// =============================================================================
// Outbound Messages (Client -> Server)
// =============================================================================

/// Authentication request, the first outbound message on both stream kinds.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    /// Action: "auth".
    pub action: &'static str,

    /// API key.
    pub key: String,

    /// API secret.
    pub secret: String,
}

impl AuthRequest {
    /// Create a new authentication request.
    #[must_use]
    pub const fn new(key: String, secret: String) -> Self {
        Self {
            action: "auth",
            key,
            secret,
        }
    }
}

/// Listen request for the order updates stream.
#[derive(Debug, Clone, Serialize)]
pub struct ListenRequest {
    /// Action: "listen".
    pub action: &'static str,

    /// Listen data.
    pub data: ListenData,
}

/// Listen data for the order updates stream.
#[derive(Debug, Clone, Serialize)]
pub struct ListenData {
    /// Streams to listen to.
    pub streams: Vec<String>,
}

impl ListenRequest {
    /// Create a listen request for order events.
    #[must_use]
    pub fn trade_updates() -> Self {
        Self {
            action: "listen",
            data: ListenData {
                streams: vec!["trade_updates".to_string()],
            },
        }
    }
}

/// Subscribe/unsubscribe request for the market data stream.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// Action: "subscribe" or "unsubscribe".
    pub action: &'static str,

    /// Trade symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<String>,

    /// Quote symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<String>,

    /// Bar symbols.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bars: Vec<String>,
}

impl SubscribeRequest {
    /// Create a subscribe request.
    #[must_use]
    pub const fn subscribe() -> Self {
        Self {
            action: "subscribe",
            trades: Vec::new(),
            quotes: Vec::new(),
            bars: Vec::new(),
        }
    }

    /// Create an unsubscribe request.
    #[must_use]
    pub const fn unsubscribe() -> Self {
        Self {
            action: "unsubscribe",
            trades: Vec::new(),
            quotes: Vec::new(),
            bars: Vec::new(),
        }
    }

    /// Set trade symbols.
    #[must_use]
    pub fn with_trades(mut self, symbols: Vec<String>) -> Self {
        self.trades = symbols;
        self
    }

    /// Set quote symbols.
    #[must_use]
    pub fn with_quotes(mut self, symbols: Vec<String>) -> Self {
        self.quotes = symbols;
        self
    }

    /// Set bar symbols.
    #[must_use]
    pub fn with_bars(mut self, symbols: Vec<String>) -> Self {
        self.bars = symbols;
        self
    }

    /// Check if no symbols are carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.quotes.is_empty() && self.bars.is_empty()
    }
}

// =============================================================================
// Unified Inbound Message Enum
// =============================================================================

/// Unified enum for all inbound stream messages.
///
/// `OrderUpdate` is boxed to keep the enum small.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Connection/authentication success.
    Success(SuccessMessage),

    /// Error message.
    Error(ErrorMessage),

    /// Subscription confirmation.
    Subscription(SubscriptionMessage),

    /// Trade tick.
    Trade(TradeMessage),

    /// NBBO quote.
    Quote(QuoteMessage),

    /// OHLCV bar.
    Bar(BarMessage),

    /// Authorization response (order stream).
    Authorization(AuthorizationMessage),

    /// Listening confirmation (order stream).
    Listening(ListeningMessage),

    /// Order update (order stream).
    OrderUpdate(Box<OrderUpdateMessage>),
}
