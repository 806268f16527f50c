//! Order Updates Stream Client
//!
//! Maintains one long-lived WebSocket connection to Alpaca's trading API
//! stream for order lifecycle events. The handshake differs from market
//! data: authentication is acknowledged with an `authorization` envelope,
//! after which the client sends a listen request for the `trade_updates`
//! channel and waits for the `listening` confirmation before reporting
//! itself connected.

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
use crate::market_data::validate_credentials;
use crate::messages::{ListenRequest, StreamMessage};
use crate::reconnect::ReconnectPolicy;

/// Handle to a running order updates stream.
///
/// Dropping the handle shuts the stream down.
#[derive(Debug)]
pub struct OrderUpdatesHandle {
    channels: ActorChannels,
    task: tokio::task::JoinHandle<()>,
}

impl OrderUpdatesHandle {
    /// Current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        self.channels.state()
    }

    /// Stop the stream. Idempotent and effective against a pending
    /// reconnect timer.
    pub fn stop(&self) {
        self.channels.stop();
    }

    /// Wait for the actor task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Order updates stream client entry point.
#[derive(Debug)]
pub struct OrderUpdatesStream;

impl OrderUpdatesStream {
    /// Spawn the stream actor and return its handle.
    ///
    /// # Errors
    ///
    /// Fails fast with [`StreamError::MissingCredentials`] when the
    /// configuration carries redacted or empty credentials.
    pub fn start(
        config: StreamConfig,
        handler: impl EventHandler + 'static,
    ) -> Result<OrderUpdatesHandle, StreamError> {
        let credentials = validate_credentials(&config.credentials)?;
        let url = config.order_updates_url();

        // The order stream has no subscribe surface; the command channel
        // exists only so the shared plumbing stays uniform.
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let actor = OrderUpdatesActor {
            url,
            credentials,
            settings: config.settings,
            codec: JsonCodec::new(),
            state_tx,
            cancel: cancel.clone(),
        };
        let dispatcher = Dispatcher::new(Box::new(handler));
        let task = tokio::spawn(actor.run(command_rx, dispatcher));

        Ok(OrderUpdatesHandle {
            channels: ActorChannels {
                commands: command_tx,
                state: state_rx,
                cancel,
            },
            task,
        })
    }
}

struct OrderUpdatesActor {
    url: String,
    credentials: Credentials,
    settings: crate::config::StreamSettings,
    codec: JsonCodec,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl OrderUpdatesActor {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Supervisor loop: connect, run, back off, repeat.
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<StreamCommand>,
        mut dispatcher: Dispatcher,
    ) {
        let mut policy = ReconnectPolicy::new(
            self.settings.reconnect_delay_initial,
            self.settings.reconnect_delay_max,
            self.settings.max_reconnect_attempts,
        );

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("order updates stream stopped");
                self.set_state(ConnectionState::Closed);
                return;
            }

            self.set_state(ConnectionState::Connecting);
            match self
                .connect_and_run(&mut commands, &mut dispatcher, &mut policy)
                .await
            {
                Ok(()) => {
                    tracing::info!("order updates stream closed gracefully");
                    self.set_state(ConnectionState::Closed);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "order updates connection error");
                    self.set_state(ConnectionState::Disconnected);

                    let Some(delay) = policy.next_delay() else {
                        tracing::error!(
                            attempts = policy.attempts(),
                            "order updates stream giving up"
                        );
                        return;
                    };

                    tracing::info!(
                        attempt = policy.attempts(),
                        delay_ms = delay.as_millis(),
                        "reconnecting to order updates stream"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("stop requested during reconnect delay");
                            self.set_state(ConnectionState::Closed);
                            return;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One connection attempt: auth, listen, then frame processing.
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
        dispatcher: &mut Dispatcher,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError> {
        tracing::info!(url = %self.url, "connecting to order updates stream");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let mut auth_handler = AuthHandler::new(self.credentials.clone());
        self.set_state(ConnectionState::Authenticating);
        let auth_request = auth_handler.auth_request()?;
        self.send_json(&mut write, &auth_request).await?;

        let mut ping = tokio::time::interval(self.settings.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.reset();
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Ok(());
                }
                command = commands.recv() => {
                    match command {
                        // No subscriptions on this stream; commands are
                        // acknowledged and dropped.
                        Some(command) => {
                            tracing::debug!(?command, "ignoring command on order updates stream");
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
                            self.handle_frame(&text, &mut auth_handler, dispatcher, policy, &mut write)
                                .await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            // The trading stream may frame JSON as binary.
                            last_inbound = Instant::now();
                            match std::str::from_utf8(&data) {
                                Ok(text) => {
                                    self.handle_frame(text, &mut auth_handler, dispatcher, policy, &mut write)
                                        .await?;
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "skipping non-UTF-8 binary frame");
                                }
                            }
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
                            tracing::info!("order updates stream ended");
                            return Err(StreamError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Decode one frame and react to each message in it.
    async fn handle_frame<W>(
        &self,
        text: &str,
        auth_handler: &mut AuthHandler,
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
                StreamMessage::Authorization(authorization) => {
                    // Rejection closes the socket and funnels into the
                    // ordinary reconnect path.
                    auth_handler.handle_authorization(&authorization)?;
                    tracing::info!("order updates stream authorized");
                    self.send_json(write, &ListenRequest::trade_updates()).await?;
                }
                StreamMessage::Listening(listening) => {
                    tracing::info!(streams = ?listening.data.streams, "listening confirmed");
                    self.set_state(ConnectionState::Connected);
                    policy.reset();
                }
                StreamMessage::OrderUpdate(update) => {
                    dispatcher.dispatch(DomainEvent::OrderUpdate(Box::new(update.data)));
                }
                StreamMessage::Error(error) => {
                    if auth_handler.is_authenticated() {
                        tracing::error!(code = error.code, msg = %error.msg, "server error");
                    } else {
                        auth_handler.handle_error(&error)?;
                    }
                }
                StreamMessage::Success(_)
                | StreamMessage::Subscription(_)
                | StreamMessage::Trade(_)
                | StreamMessage::Quote(_)
                | StreamMessage::Bar(_) => {
                    tracing::trace!("ignoring market-data message on order updates stream");
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
