//! Subscription Registry
//!
//! Desired-state registry for market data channels. The registry lives inside
//! the stream actor and survives disconnects: callers mutate it through
//! subscribe/unsubscribe commands, and after every successful
//! (re)authentication its full contents are replayed to the server as one
//! consolidated subscribe message.

use std::collections::BTreeSet;

use crate::messages::SubscribeRequest;

/// A set of symbols to subscribe to or unsubscribe from, per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSpec {
    /// Trade channel symbols.
    pub trades: Vec<String>,
    /// Quote channel symbols.
    pub quotes: Vec<String>,
    /// Bar channel symbols.
    pub bars: Vec<String>,
}

impl SubscriptionSpec {
    /// Create an empty spec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trades: Vec::new(),
            quotes: Vec::new(),
            bars: Vec::new(),
        }
    }

    /// Add trade symbols.
    #[must_use]
    pub fn trades<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trades.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Add quote symbols.
    #[must_use]
    pub fn quotes<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quotes.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Add bar symbols.
    #[must_use]
    pub fn bars<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bars.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Whether the spec names no symbols at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.quotes.is_empty() && self.bars.is_empty()
    }

    /// Wire message subscribing to exactly this spec's symbols.
    #[must_use]
    pub fn to_subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::subscribe()
            .with_trades(self.trades.clone())
            .with_quotes(self.quotes.clone())
            .with_bars(self.bars.clone())
    }

    /// Wire message unsubscribing from exactly this spec's symbols.
    #[must_use]
    pub fn to_unsubscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::unsubscribe()
            .with_trades(self.trades.clone())
            .with_quotes(self.quotes.clone())
            .with_bars(self.bars.clone())
    }
}

/// The full desired subscription state for one market data stream.
///
/// Ordered sets keep the replayed wire messages deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    trades: BTreeSet<String>,
    quotes: BTreeSet<String>,
    bars: BTreeSet<String>,
}

impl SubscriptionSet {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trades: BTreeSet::new(),
            quotes: BTreeSet::new(),
            bars: BTreeSet::new(),
        }
    }

    /// Merge a spec into the registry. Duplicates are absorbed.
    pub fn merge(&mut self, spec: &SubscriptionSpec) {
        self.trades.extend(spec.trades.iter().cloned());
        self.quotes.extend(spec.quotes.iter().cloned());
        self.bars.extend(spec.bars.iter().cloned());
    }

    /// Remove a spec's symbols. Symbols not present are ignored.
    pub fn remove(&mut self, spec: &SubscriptionSpec) {
        for symbol in &spec.trades {
            self.trades.remove(symbol);
        }
        for symbol in &spec.quotes {
            self.quotes.remove(symbol);
        }
        for symbol in &spec.bars {
            self.bars.remove(symbol);
        }
    }

    /// Whether the registry holds no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.quotes.is_empty() && self.bars.is_empty()
    }

    /// Total number of symbol/channel entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.len() + self.quotes.len() + self.bars.len()
    }

    /// One consolidated subscribe message covering the full registry, or
    /// `None` when there is nothing to replay.
    #[must_use]
    pub fn to_subscribe_request(&self) -> Option<SubscribeRequest> {
        if self.is_empty() {
            return None;
        }
        Some(
            SubscribeRequest::subscribe()
                .with_trades(self.trades.iter().cloned().collect())
                .with_quotes(self.quotes.iter().cloned().collect())
                .with_bars(self.bars.iter().cloned().collect()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn merge_is_idempotent() {
        let mut set = SubscriptionSet::new();
        let spec = SubscriptionSpec::new().trades(["AAPL", "MSFT"]).quotes(["AAPL"]);

        set.merge(&spec);
        set.merge(&spec);

        assert_eq!(set.len(), 3);
    }

    #[test]
    fn remove_ignores_absent_symbols() {
        let mut set = SubscriptionSet::new();
        set.merge(&SubscriptionSpec::new().trades(["AAPL"]));

        set.remove(&SubscriptionSpec::new().trades(["TSLA"]).bars(["AAPL"]));
        assert_eq!(set.len(), 1);

        set.remove(&SubscriptionSpec::new().trades(["AAPL"]));
        assert!(set.is_empty());
    }

    #[test]
    fn empty_registry_yields_no_request() {
        let set = SubscriptionSet::new();
        assert!(set.to_subscribe_request().is_none());
    }

    #[test]
    fn consolidated_request_covers_all_channels() {
        let mut set = SubscriptionSet::new();
        set.merge(&SubscriptionSpec::new().trades(["MSFT", "AAPL"]));
        set.merge(&SubscriptionSpec::new().quotes(["SPY"]).bars(["QQQ"]));

        let request = set.to_subscribe_request().unwrap();
        assert_eq!(request.action, "subscribe");
        // BTreeSet ordering makes the replay deterministic.
        assert_eq!(request.trades, vec!["AAPL", "MSFT"]);
        assert_eq!(request.quotes, vec!["SPY"]);
        assert_eq!(request.bars, vec!["QQQ"]);
    }

    #[test]
    fn spec_builders_accumulate() {
        let spec = SubscriptionSpec::new()
            .trades(["AAPL"])
            .trades(["MSFT"])
            .quotes(["SPY"]);
        assert_eq!(spec.trades, vec!["AAPL", "MSFT"]);
        assert_eq!(spec.quotes, vec!["SPY"]);
        assert!(!spec.is_empty());
        assert!(SubscriptionSpec::new().is_empty());
    }

    fn symbol() -> impl Strategy<Value = String> {
        "[A-Z]{1,5}"
    }

    fn spec() -> impl Strategy<Value = SubscriptionSpec> {
        (
            proptest::collection::vec(symbol(), 0..8),
            proptest::collection::vec(symbol(), 0..8),
            proptest::collection::vec(symbol(), 0..8),
        )
            .prop_map(|(trades, quotes, bars)| SubscriptionSpec {
                trades,
                quotes,
                bars,
            })
    }

    proptest! {
        /// Subscribing then unsubscribing the same spec restores the registry.
        #[test]
        fn merge_then_remove_restores(base in spec(), delta in spec()) {
            let mut set = SubscriptionSet::new();
            set.merge(&base);
            let before = set.clone();

            // Only meaningful when the delta is disjoint from the base.
            let disjoint = delta.trades.iter().all(|s| !set.trades.contains(s))
                && delta.quotes.iter().all(|s| !set.quotes.contains(s))
                && delta.bars.iter().all(|s| !set.bars.contains(s));
            prop_assume!(disjoint);

            set.merge(&delta);
            set.remove(&delta);
            prop_assert_eq!(set, before);
        }

        /// A replayed request names every registered symbol exactly once.
        #[test]
        fn replay_covers_registry(a in spec(), b in spec()) {
            let mut set = SubscriptionSet::new();
            set.merge(&a);
            set.merge(&b);
            prop_assume!(!set.is_empty());

            let request = set.to_subscribe_request().unwrap();
            prop_assert_eq!(request.trades.len(), set.trades.len());
            prop_assert_eq!(request.quotes.len(), set.quotes.len());
            prop_assert_eq!(request.bars.len(), set.bars.len());
            for symbol in &a.trades {
                prop_assert!(request.trades.iter().any(|s| s == symbol));
            }
        }
    }
}
