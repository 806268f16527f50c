//! Shared Connection Vocabulary
//!
//! State, commands and errors common to both stream clients. Each client is
//! an actor: one spawned task owns the socket and all mutable state, a handle
//! talks to it through an unbounded command channel, and the connection state
//! is published through a watch channel so it stays readable after the actor
//! exits.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthError;
use crate::codec::CodecError;
use crate::subscription::SubscriptionSpec;

/// Lifecycle state of one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP/TLS/WebSocket handshake in progress.
    Connecting,
    /// Socket open, auth handshake in flight.
    Authenticating,
    /// Authenticated and processing frames.
    Connected,
    /// Connection lost; reconnecting or terminally down.
    Disconnected,
    /// Stopped by the caller. Terminal.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Commands accepted by a stream actor's mailbox.
#[derive(Debug)]
pub enum StreamCommand {
    /// Add symbols to the desired subscription state.
    Subscribe(SubscriptionSpec),
    /// Remove symbols from the desired subscription state.
    Unsubscribe(SubscriptionSpec),
}

/// Errors surfaced by the stream clients.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Credentials were missing or empty at startup.
    #[error("missing credentials: {0}")]
    MissingCredentials(#[from] crate::config::ConfigError),

    /// Server rejected authentication.
    #[error("authentication failed: {0}")]
    AuthRejected(#[from] AuthError),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Reconnection attempt budget exhausted.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,

    /// Server closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// No pong within the configured timeout window.
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
}

/// Shared plumbing between a stream handle and its actor.
#[derive(Debug)]
pub(crate) struct ActorChannels {
    pub commands: mpsc::UnboundedSender<StreamCommand>,
    pub state: watch::Receiver<ConnectionState>,
    pub cancel: CancellationToken,
}

impl ActorChannels {
    /// Current connection state, readable even after the actor exited.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Request shutdown. Idempotent; wakes a pending backoff timer.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[test]
    fn channels_report_latest_state() {
        let (commands, _rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let channels = ActorChannels {
            commands,
            state: state_rx,
            cancel: CancellationToken::new(),
        };

        assert_eq!(channels.state(), ConnectionState::Connecting);
        state_tx.send_replace(ConnectionState::Connected);
        assert_eq!(channels.state(), ConnectionState::Connected);

        channels.stop();
        assert!(channels.cancel.is_cancelled());
    }
}
