//! Per-connection subscription set and client command handling.

use std::collections::HashSet;

use super::messages::{ClientRequest, Topic};

/// Topics a single WebSocket client is subscribed to.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    topics: HashSet<Topic>,
}

impl SubscriptionSet {
    /// Creates an empty set; a new client receives nothing until it
    /// subscribes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a topic. Returns `false` if it was already present.
    pub fn subscribe(&mut self, topic: Topic) -> bool {
        self.topics.insert(topic)
    }

    /// Removes a topic. Returns `false` if it was not present.
    pub fn unsubscribe(&mut self, topic: Topic) -> bool {
        self.topics.remove(&topic)
    }

    /// Returns `true` if messages on `topic` should be delivered.
    #[must_use]
    pub fn matches(&self, topic: Topic) -> bool {
        self.topics.contains(&topic)
    }

    /// Number of subscribed topics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.topics.len()
    }
}

/// Effect of one inbound client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The topic was added.
    Subscribed(Topic),
    /// The topic was removed.
    Unsubscribed(Topic),
    /// Malformed JSON, unknown action or unknown topic.
    Ignored,
}

/// Applies a raw client text frame to `subs`.
///
/// Nothing is ever sent back: bad input is logged and dropped.
pub fn handle_client_text(text: &str, subs: &mut SubscriptionSet) -> CommandOutcome {
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed client message");
            return CommandOutcome::Ignored;
        }
    };
    let topic = match request.topic.parse::<Topic>() {
        Ok(topic) => topic,
        Err(e) => {
            tracing::warn!(action = %request.action, error = %e, "ignoring client request");
            return CommandOutcome::Ignored;
        }
    };
    match request.action.as_str() {
        "subscribe" => {
            subs.subscribe(topic);
            tracing::debug!(%topic, "client subscribed");
            CommandOutcome::Subscribed(topic)
        }
        "unsubscribe" => {
            subs.unsubscribe(topic);
            tracing::debug!(%topic, "client unsubscribed");
            CommandOutcome::Unsubscribed(topic)
        }
        other => {
            tracing::warn!(action = other, "unknown client action");
            CommandOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let subs = SubscriptionSet::new();
        assert!(!subs.matches(Topic::SwapEvents));
        assert!(!subs.matches(Topic::Leaderboard));
    }

    #[test]
    fn subscribe_then_unsubscribe() {
        let mut subs = SubscriptionSet::new();
        assert!(subs.subscribe(Topic::Leaderboard));
        assert!(!subs.subscribe(Topic::Leaderboard));
        assert!(subs.matches(Topic::Leaderboard));
        assert!(!subs.matches(Topic::SwapEvents));
        assert!(subs.unsubscribe(Topic::Leaderboard));
        assert!(!subs.matches(Topic::Leaderboard));
        assert_eq!(subs.count(), 0);
    }

    #[test]
    fn client_text_mutates_subscriptions() {
        let mut subs = SubscriptionSet::new();
        let outcome = handle_client_text(r#"{"action":"subscribe","topic":"campaign"}"#, &mut subs);
        assert_eq!(outcome, CommandOutcome::Subscribed(Topic::Campaign));
        assert!(subs.matches(Topic::Campaign));

        let outcome = handle_client_text(r#"{"action":"unsubscribe","topic":"campaign"}"#, &mut subs);
        assert_eq!(outcome, CommandOutcome::Unsubscribed(Topic::Campaign));
        assert!(!subs.matches(Topic::Campaign));
    }

    #[test]
    fn bad_input_is_ignored() {
        let mut subs = SubscriptionSet::new();
        for text in [
            "not json",
            r#"{"action":"subscribe","topic":"prices"}"#,
            r#"{"action":"shout","topic":"leaderboard"}"#,
            r#"{"topic":"leaderboard"}"#,
        ] {
            assert_eq!(handle_client_text(text, &mut subs), CommandOutcome::Ignored);
        }
        assert_eq!(subs.count(), 0);
    }
}
