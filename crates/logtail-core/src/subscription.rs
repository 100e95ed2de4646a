// ── Channel subscription state ──
//
// Two sets: what the server can stream (`available`, replaced wholesale on
// every channel_list) and what the user wants (`desired`). The server-side
// subscription is always the full desired set; there is no diffing.

use std::collections::BTreeSet;

use logtail_api::OutboundMessage;

/// What a channel picker should display after a channel list arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Every advertised channel, sorted.
    pub available: Vec<String>,
    /// The desired channels that are also available.
    pub selected: BTreeSet<String>,
}

impl ChannelOptions {
    pub fn is_selected(&self, channel: &str) -> bool {
        self.selected.contains(channel)
    }
}

/// Tracks desired vs. available channels and builds listen requests.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSynchronizer {
    desired: BTreeSet<String>,
    available: Vec<String>,
}

impl SubscriptionSynchronizer {
    pub fn new(desired: BTreeSet<String>) -> Self {
        Self {
            desired,
            available: Vec::new(),
        }
    }

    pub fn desired(&self) -> &BTreeSet<String> {
        &self.desired
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// Replace the desired set. Channels the server does not advertise are
    /// kept: they may appear in a later channel list.
    pub fn set_desired(&mut self, desired: BTreeSet<String>) {
        self.desired = desired;
    }

    /// A listen request carrying the full desired set, empty or not.
    pub fn listen_request(&self) -> OutboundMessage {
        OutboundMessage::listen_request(self.desired.iter().cloned())
    }

    /// The request to send when a connection opens, if there is anything to
    /// subscribe to.
    pub fn resubscribe_request(&self) -> Option<OutboundMessage> {
        (!self.desired.is_empty()).then(|| self.listen_request())
    }

    /// Replace the available set and return what the picker should show.
    pub fn on_channel_list_received(&mut self, mut channels: Vec<String>) -> ChannelOptions {
        channels.sort();
        channels.dedup();
        self.available = channels;
        self.options()
    }

    pub fn options(&self) -> ChannelOptions {
        ChannelOptions {
            available: self.available.clone(),
            selected: self
                .available
                .iter()
                .filter(|c| self.desired.contains(*c))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn refresh_keeps_selection_of_still_available_channels() {
        let mut sync = SubscriptionSynchronizer::new(set(&["b"]));
        let options = sync.on_channel_list_received(vec!["b".into(), "a".into()]);

        assert_eq!(
            options,
            ChannelOptions {
                available: vec!["a".into(), "b".into()],
                selected: set(&["b"]),
            }
        );
        assert!(options.is_selected("b"));
        assert!(!options.is_selected("a"));
    }

    #[test]
    fn channel_list_replaces_never_merges() {
        let mut sync = SubscriptionSynchronizer::default();
        sync.on_channel_list_received(vec!["x".into(), "y".into()]);
        sync.on_channel_list_received(vec!["z".into()]);
        assert_eq!(sync.available(), ["z".to_owned()]);
    }

    #[test]
    fn desired_outside_available_is_kept_but_not_selected() {
        let mut sync = SubscriptionSynchronizer::new(set(&["gone", "here"]));
        let options = sync.on_channel_list_received(vec!["here".into()]);

        assert_eq!(options.selected, set(&["here"]));
        assert_eq!(sync.desired(), &set(&["gone", "here"]));
    }

    #[test]
    fn resubscribe_only_when_something_is_desired() {
        let mut sync = SubscriptionSynchronizer::default();
        assert_eq!(sync.resubscribe_request(), None);

        sync.set_desired(set(&["#rust", "#go"]));
        assert_eq!(
            sync.resubscribe_request(),
            Some(OutboundMessage::listen_request(["#go", "#rust"]))
        );
    }

    #[test]
    fn empty_listen_request_clears_subscription() {
        let sync = SubscriptionSynchronizer::default();
        assert_eq!(
            sync.listen_request(),
            OutboundMessage::ListenRequest { channels: vec![] }
        );
    }
}
