//! Event Dispatching
//!
//! Delivers decoded domain events to the caller's handler. Handler code is
//! untrusted from the stream's point of view: a panic inside a callback is
//! caught, logged and counted, and never disturbs the connection. Ten
//! consecutive failures only raise the log severity.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{error, trace, warn};

use crate::messages::{BarMessage, OrderUpdateData, QuoteMessage, TradeMessage};

/// Consecutive handler failures at which logging escalates to `error!`.
const CONSECUTIVE_ERROR_THRESHOLD: u32 = 10;

/// A decoded event delivered to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A market trade.
    Trade(TradeMessage),
    /// An NBBO quote.
    Quote(QuoteMessage),
    /// An aggregated bar.
    Bar(BarMessage),
    /// An order lifecycle event.
    OrderUpdate(Box<OrderUpdateData>),
}

/// Receiver for stream events.
///
/// Implemented for any `FnMut(DomainEvent)` closure, so a method bound to a
/// target is written as a capturing closure.
pub trait EventHandler: Send {
    /// Handle one event. Panics are caught by the dispatcher.
    fn on_event(&mut self, event: DomainEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(DomainEvent) + Send,
{
    fn on_event(&mut self, event: DomainEvent) {
        self(event);
    }
}

/// Wraps the caller's handler with panic isolation and failure accounting.
pub struct Dispatcher {
    handler: Box<dyn EventHandler>,
    consecutive_errors: u32,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("consecutive_errors", &self.consecutive_errors)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Wrap a handler.
    #[must_use]
    pub fn new(handler: Box<dyn EventHandler>) -> Self {
        Self {
            handler,
            consecutive_errors: 0,
        }
    }

    /// Consecutive failed deliveries so far.
    #[must_use]
    pub const fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Deliver one event, isolating handler panics.
    pub fn dispatch(&mut self, event: DomainEvent) {
        trace!(?event, "dispatching event");
        let result = catch_unwind(AssertUnwindSafe(|| self.handler.on_event(event)));

        match result {
            Ok(()) => {
                self.consecutive_errors = 0;
            }
            Err(panic) => {
                self.consecutive_errors += 1;
                let reason = panic_message(&*panic);
                if self.consecutive_errors >= CONSECUTIVE_ERROR_THRESHOLD {
                    error!(
                        consecutive_errors = self.consecutive_errors,
                        reason, "event handler panicked repeatedly"
                    );
                } else {
                    warn!(
                        consecutive_errors = self.consecutive_errors,
                        reason, "event handler panicked"
                    );
                }
            }
        }
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
