//! Market Data Stream Client
//!
//! Maintains one long-lived WebSocket connection to Alpaca's market data
//! feed. A single spawned task owns the socket, the auth handshake, the
//! subscription registry and the dispatcher; the [`MarketDataHandle`] talks
//! to it through a command channel. On every (re)connect the client
//! authenticates and replays the full desired subscription state.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthHandler;
use crate::client::{ActorChannels, ConnectionState, StreamCommand, StreamError};
use crate::codec::JsonCodec;
use crate::config::{Credentials, StreamConfig};
use crate::dispatch::{Dispatcher, DomainEvent, EventHandler};
use crate::messages::StreamMessage;
use crate::reconnect::ReconnectPolicy;
use crate::subscription::{SubscriptionSet, SubscriptionSpec};

/// Handle to a running market data stream.
///
/// Dropping the handle shuts the stream down; hold it for as long as events
/// should flow.
#[derive(Debug)]
pub struct MarketDataHandle {
    channels: ActorChannels,
    task: tokio::task::JoinHandle<()>,
}

impl MarketDataHandle {
    /// Add symbols to the desired subscription state.
    ///
    /// Takes effect immediately in the registry; the wire message is sent
    /// now if connected, otherwise replayed after the next authentication.
    pub fn subscribe(&self, spec: SubscriptionSpec) {
        let _ = self.channels.commands.send(StreamCommand::Subscribe(spec));
    }

    /// Remove symbols from the desired subscription state.
    pub fn unsubscribe(&self, spec: SubscriptionSpec) {
        let _ = self
            .channels
            .commands
            .send(StreamCommand::Unsubscribe(spec));
    }

    /// Current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        self.channels.state()
    }

    /// Stop the stream. Idempotent, effective against a pending reconnect
    /// timer, and never reopens a socket.
    pub fn stop(&self) {
        self.channels.stop();
    }

    /// Wait for the actor task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Market data stream client entry point.
#[derive(Debug)]
pub struct MarketDataStream;

impl MarketDataStream {
    /// Spawn the stream actor and return its handle.
    ///
    /// # Errors
    ///
    /// Fails fast with [`StreamError::MissingCredentials`] when the
    /// configuration carries redacted or empty credentials.
    pub fn start(
        config: StreamConfig,
        handler: impl EventHandler + 'static,
    ) -> Result<MarketDataHandle, StreamError> {
        let credentials = validate_credentials(&config.credentials)?;
        let url = config.market_data_url();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let actor = MarketDataActor {
            url,
            credentials,
            settings: config.settings,
            codec: JsonCodec::new(),
            state_tx,
            cancel: cancel.clone(),
        };
        let dispatcher = Dispatcher::new(Box::new(handler));
        let task = tokio::spawn(actor.run(command_rx, dispatcher));

        Ok(MarketDataHandle {
            channels: ActorChannels {
                commands: command_tx,
                state: state_rx,
                cancel,
            },
            task,
        })
    }
}

/// Reject empty or already-scrubbed credentials before spawning anything.
pub(crate) fn validate_credentials(credentials: &Credentials) -> Result<Credentials, StreamError> {
    if credentials.is_redacted() {
        tracing::warn!("refusing to start a stream with redacted credentials");
        return Err(StreamError::MissingCredentials(
            crate::config::ConfigError::EmptyValue("credentials are redacted".to_string()),
        ));
    }
    Ok(credentials.clone())
}

struct MarketDataActor {
    url: String,
    credentials: Credentials,
    settings: crate::config::StreamSettings,
    codec: JsonCodec,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl MarketDataActor {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// Supervisor loop: connect, run, back off, repeat.
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<StreamCommand>,
        mut dispatcher: Dispatcher,
    ) {
        let mut registry = SubscriptionSet::new();
        let mut policy = ReconnectPolicy::new(
            self.settings.reconnect_delay_initial,
            self.settings.reconnect_delay_max,
            self.settings.max_reconnect_attempts,
        );

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("market data stream stopped");
                self.set_state(ConnectionState::Closed);
                return;
            }

            self.set_state(ConnectionState::Connecting);
            match self
                .connect_and_run(&mut commands, &mut registry, &mut dispatcher, &mut policy)
                .await
            {
                Ok(()) => {
                    tracing::info!("market data stream closed gracefully");
                    self.set_state(ConnectionState::Closed);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "market data connection error");
                    self.set_state(ConnectionState::Disconnected);

                    let Some(delay) = policy.next_delay() else {
                        tracing::error!(
                            attempts = policy.attempts(),
                            "market data stream giving up"
                        );
                        return;
                    };

                    tracing::info!(
                        attempt = policy.attempts(),
                        delay_ms = delay.as_millis(),
                        "reconnecting to market data stream"
                    );

                    if !self
                        .backoff(delay, &mut commands, &mut registry)
                        .await
                    {
                        self.set_state(ConnectionState::Closed);
                        return;
                    }
                }
            }
        }
    }

    /// Sleep out a backoff delay while still applying registry commands.
    ///
    /// Returns `false` when cancelled or the handle was dropped.
    async fn backoff(
        &self,
        delay: std::time::Duration,
        commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
        registry: &mut SubscriptionSet,
    ) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("stop requested during reconnect delay");
                    return false;
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => apply_registry_command(registry, &command),
                        None => {
                            tracing::debug!("handle dropped during reconnect delay");
                            return false;
                        }
                    }
                }
                () = &mut sleep => return true,
            }
        }
    }

    /// One connection attempt: handshake, then frame/command processing
    /// until an error or cancellation.
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
        registry: &mut SubscriptionSet,
        dispatcher: &mut Dispatcher,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError> {
        tracing::info!(url = %self.url, "connecting to market data stream");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.url).await?;
        let (mut write, mut read) = ws_stream.split();

        // Fresh handler with a live credential copy; the previous one
        // scrubbed its copy after the last successful handshake.
        let mut auth_handler = AuthHandler::new(self.credentials.clone());
        self.set_state(ConnectionState::Authenticating);
        let auth_request = auth_handler.auth_request()?;
        self.send_json(&mut write, &auth_request).await?;

        let mut ping = tokio::time::interval(self.settings.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.reset(); // First tick fires after one full interval.
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Ok(());
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            self.handle_command(&command, registry, &mut write).await?;
                        }
                        None => {
                            tracing::debug!("handle dropped, shutting down");
                            return Ok(());
                        }
                    }
                }
                _ = ping.tick() => {
                    if last_inbound.elapsed() > self.settings.ping_timeout {
                        tracing::warn!("no inbound traffic within ping timeout");
                        return Err(StreamError::HeartbeatTimeout);
                    }
                    write.send(Message::Ping(vec![].into())).await?;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            last_inbound = Instant::now();
                            self.handle_frame(
                                &text,
                                &mut auth_handler,
                                registry,
                                dispatcher,
                                policy,
                                &mut write,
                            )
                            .await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_inbound = Instant::now();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            last_inbound = Instant::now();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("server sent close frame");
                            return Err(StreamError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("market data stream ended");
                            return Err(StreamError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Apply a mailbox command to the registry, and to the wire when
    /// currently connected.
    async fn handle_command<W>(
        &self,
        command: &StreamCommand,
        registry: &mut SubscriptionSet,
        write: &mut W,
    ) -> Result<(), StreamError>
    where
        W: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        apply_registry_command(registry, command);

        if !self.is_connected() {
            return Ok(());
        }

        match command {
            StreamCommand::Subscribe(spec) if !spec.is_empty() => {
                self.send_json(write, &spec.to_subscribe_request()).await
            }
            StreamCommand::Unsubscribe(spec) if !spec.is_empty() => {
                self.send_json(write, &spec.to_unsubscribe_request()).await
            }
            _ => Ok(()),
        }
    }

    /// Decode one text frame and react to each message in it.
    ///
    /// Decode failures are logged and skipped; they never tear the
    /// connection down.
    async fn handle_frame<W>(
        &self,
        text: &str,
        auth_handler: &mut AuthHandler,
        registry: &mut SubscriptionSet,
        dispatcher: &mut Dispatcher,
        policy: &mut ReconnectPolicy,
        write: &mut W,
    ) -> Result<(), StreamError>
    where
        W: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed frame");
                return Ok(());
            }
        };

        for message in messages {
            match message {
                StreamMessage::Success(success) => {
                    if auth_handler.handle_success(&success) {
                        tracing::info!("market data stream authenticated");
                        self.set_state(ConnectionState::Connected);
                        policy.reset();

                        if let Some(request) = registry.to_subscribe_request() {
                            tracing::debug!(symbols = registry.len(), "replaying subscriptions");
                            self.send_json(write, &request).await?;
                        }
                    }
                }
                StreamMessage::Error(error) => {
                    if auth_handler.is_authenticated() {
                        tracing::error!(code = error.code, msg = %error.msg, "server error");
                    } else {
                        auth_handler.handle_error(&error)?;
                    }
                }
                StreamMessage::Subscription(confirmation) => {
                    tracing::debug!(
                        trades = ?confirmation.trades,
                        quotes = ?confirmation.quotes,
                        bars = ?confirmation.bars,
                        "subscription confirmed"
                    );
                }
                StreamMessage::Trade(trade) => {
                    dispatcher.dispatch(DomainEvent::Trade(trade));
                }
                StreamMessage::Quote(quote) => {
                    dispatcher.dispatch(DomainEvent::Quote(quote));
                }
                StreamMessage::Bar(bar) => {
                    dispatcher.dispatch(DomainEvent::Bar(bar));
                }
                StreamMessage::Authorization(_)
                | StreamMessage::Listening(_)
                | StreamMessage::OrderUpdate(_) => {
                    tracing::trace!("ignoring order-stream message on market data stream");
                }
            }
        }

        Ok(())
    }

    /// Serialize a request and send it as one text frame.
    async fn send_json<W, T>(&self, write: &mut W, request: &T) -> Result<(), StreamError>
    where
        W: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
        T: serde::Serialize,
    {
        let json = self.codec.encode(request)?;
        write.send(Message::Text(json.into())).await?;
        Ok(())
    }
}

/// Mutate the desired-state registry for one command.
fn apply_registry_command(registry: &mut SubscriptionSet, command: &StreamCommand) {
    match command {
        StreamCommand::Subscribe(spec) => registry.merge(spec),
        StreamCommand::Unsubscribe(spec) => registry.remove(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REDACTED;

    #[test]
    fn start_rejects_redacted_credentials() {
        let credentials = Credentials::redacted();
        assert_eq!(credentials.key(), REDACTED);
        assert!(matches!(
            validate_credentials(&credentials),
            Err(StreamError::MissingCredentials(_))
        ));
    }

    #[test]
    fn registry_commands_apply_offline() {
        let mut registry = SubscriptionSet::new();

        apply_registry_command(
            &mut registry,
            &StreamCommand::Subscribe(SubscriptionSpec::new().trades(["AAPL", "MSFT"])),
        );
        assert_eq!(registry.len(), 2);

        apply_registry_command(
            &mut registry,
            &StreamCommand::Unsubscribe(SubscriptionSpec::new().trades(["MSFT"])),
        );
        let request = registry.to_subscribe_request().unwrap();
        assert_eq!(request.trades, vec!["AAPL"]);
    }
}
