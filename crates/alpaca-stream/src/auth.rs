//! Authentication Handshake
//!
//! Both stream kinds authenticate with the same `{"action":"auth",...}`
//! request but acknowledge differently: the market data feed replies with a
//! `success`/`authenticated` control message, the order events feed with an
//! `authorization` envelope. [`AuthHandler`] tracks the handshake state for
//! one connection and scrubs its credential copy once the server accepts.

use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::messages::{AuthRequest, AuthorizationMessage, ErrorMessage, SuccessKind, SuccessMessage};

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Server rejected the credentials.
    #[error("authentication rejected: code {code}, {message}")]
    Rejected {
        /// Server error code.
        code: i32,
        /// Server error text.
        message: String,
    },

    /// The handler's credentials were already scrubbed.
    #[error("credentials already redacted, cannot re-authenticate")]
    CredentialsRedacted,
}

/// Handshake progress for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Connected, auth request not yet sent.
    Pending,
    /// Auth request written to the socket, awaiting the ack.
    Sent,
    /// Server accepted the credentials.
    Authenticated,
    /// Server rejected the credentials.
    Failed,
}

/// Per-connection authentication handler.
///
/// Holds a working copy of the credentials for the duration of the handshake
/// and overwrites both fields with the opaque redaction marker as soon as the
/// server confirms them. A reconnect builds a fresh handler from the
/// credential provider, never from a scrubbed copy.
#[derive(Debug)]
pub struct AuthHandler {
    credentials: Credentials,
    state: AuthState,
}

impl AuthHandler {
    /// Create a handler for a new connection attempt.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            state: AuthState::Pending,
        }
    }

    /// Current handshake state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Whether the server has accepted the credentials.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated)
    }

    /// Build the auth request and mark it as sent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialsRedacted`] if the held copy was
    /// already scrubbed.
    pub fn auth_request(&mut self) -> Result<AuthRequest, AuthError> {
        if self.credentials.is_redacted() {
            return Err(AuthError::CredentialsRedacted);
        }
        self.state = AuthState::Sent;
        debug!("auth request prepared");
        Ok(AuthRequest::new(
            self.credentials.key().to_string(),
            self.credentials.secret().to_string(),
        ))
    }

    /// Process a market data `success` control message.
    ///
    /// Returns `true` when this message completed the handshake.
    pub fn handle_success(&mut self, message: &SuccessMessage) -> bool {
        match message.msg {
            SuccessKind::Connected => {
                debug!("stream connection confirmed");
                false
            }
            SuccessKind::Authenticated => {
                self.complete();
                true
            }
        }
    }

    /// Process an order-stream `authorization` envelope.
    ///
    /// Returns `true` on success.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] when the server reports anything but
    /// `authorized`.
    pub fn handle_authorization(
        &mut self,
        message: &AuthorizationMessage,
    ) -> Result<bool, AuthError> {
        if message.is_authorized() {
            self.complete();
            Ok(true)
        } else {
            self.state = AuthState::Failed;
            warn!(status = %message.data.status, "authorization rejected");
            Err(AuthError::Rejected {
                code: 0,
                message: format!("authorization status: {}", message.data.status),
            })
        }
    }

    /// Process a server `error` frame received during the handshake.
    ///
    /// # Errors
    ///
    /// Always returns [`AuthError::Rejected`] carrying the server's code and
    /// text; the connection loop closes the socket and reconnects.
    pub fn handle_error(&mut self, message: &ErrorMessage) -> Result<(), AuthError> {
        self.state = AuthState::Failed;
        warn!(code = message.code, msg = %message.msg, "authentication error");
        Err(AuthError::Rejected {
            code: message.code,
            message: message.msg.clone(),
        })
    }

    /// Mark the handshake complete and scrub the held credential copy.
    fn complete(&mut self) {
        self.state = AuthState::Authenticated;
        self.credentials = Credentials::redacted();
        info!("authenticated, credentials scrubbed from connection state");
    }
}
