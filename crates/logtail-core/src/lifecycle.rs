// ── Connection lifecycle ──
//
// A synchronous state machine that owns the one live connection. It never
// awaits: transport notices, due retries, and selection changes are fed in
// by the caller (see `client::LogClient`), and each call runs to completion
// before the next. Connection attempts and timers go through the
// `Connector` and `RetryScheduler` seams.

use std::collections::BTreeSet;
use std::fmt;

use logtail_api::{
    CloseCode, ConnectionId, InboundBody, OutboundMessage, TransportEvent, TransportNotice,
};

use crate::error::CoreError;
use crate::retry::{RetryPolicy, RetryScheduler, RetryTicket, ScheduledRetry};
use crate::sink::{EventSink, ProtocolNotification};
use crate::subscription::{ChannelOptions, SubscriptionSynchronizer};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Retrying {
        attempt: u32,
    },
    /// Reconnect attempts are exhausted. Only an explicit `start()` leaves it.
    Failed,
}

impl ConnectionState {
    /// Short machine-readable name (`"retrying"`, `"open"`, ...).
    pub fn label(&self) -> &'static str {
        self.into()
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrying { attempt } => write!(f, "retrying (attempt {attempt})"),
            other => f.write_str(other.label()),
        }
    }
}

// ── Seams ────────────────────────────────────────────────────────

/// Write side of one connection attempt.
pub trait Connection {
    fn send_text(&mut self, text: String) -> Result<(), logtail_api::Error>;

    /// Begin closing. The terminal notice for this connection follows later.
    fn close(&mut self, code: CloseCode);
}

/// Starts connection attempts. Notices for the attempt must be tagged with
/// the id passed in.
pub trait Connector {
    type Connection: Connection;

    fn connect(&mut self, id: ConnectionId) -> Self::Connection;
}

impl Connection for logtail_api::WsConnection {
    fn send_text(&mut self, text: String) -> Result<(), logtail_api::Error> {
        logtail_api::WsConnection::send_text(self, text)
    }

    fn close(&mut self, code: CloseCode) {
        logtail_api::WsConnection::close(self, code);
    }
}

struct LiveConnection<T> {
    id: ConnectionId,
    handle: T,
}

// ── LifecycleManager ─────────────────────────────────────────────

/// Owns the connection, the retry counter, and the channel sets.
///
/// Dropping the manager cancels any pending retry and closes the live
/// connection with [`CloseCode::NORMAL`].
pub struct LifecycleManager<C: Connector, R: RetryScheduler, S: EventSink> {
    connector: C,
    scheduler: R,
    sink: S,
    policy: RetryPolicy,
    state: ConnectionState,
    live: Option<LiveConnection<C::Connection>>,
    last_id: ConnectionId,
    /// Single-flight guard: set while a handshake is outstanding.
    connect_in_flight: bool,
    retry_count: u32,
    pending_retry: Option<ScheduledRetry>,
    last_ticket: RetryTicket,
    shutdown_requested: bool,
    subscription: SubscriptionSynchronizer,
}

impl<C: Connector, R: RetryScheduler, S: EventSink> LifecycleManager<C, R, S> {
    /// Create an idle manager. Does NOT connect -- call [`start()`](Self::start).
    pub fn new(
        connector: C,
        scheduler: R,
        sink: S,
        policy: RetryPolicy,
        desired: BTreeSet<String>,
    ) -> Self {
        Self {
            connector,
            scheduler,
            sink,
            policy,
            state: ConnectionState::Idle,
            live: None,
            last_id: ConnectionId::new(0),
            connect_in_flight: false,
            retry_count: 0,
            pending_retry: None,
            last_ticket: RetryTicket::new(0),
            shutdown_requested: false,
            subscription: SubscriptionSynchronizer::new(desired),
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.live.as_ref().map(|live| live.id)
    }

    pub fn has_live_connection(&self) -> bool {
        self.live.is_some()
    }

    pub fn desired_channels(&self) -> &BTreeSet<String> {
        self.subscription.desired()
    }

    pub fn channel_options(&self) -> ChannelOptions {
        self.subscription.options()
    }

    pub fn pending_retry(&self) -> Option<&ScheduledRetry> {
        self.pending_retry.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Begin a connection attempt.
    ///
    /// A no-op while an attempt is in flight or a connection is open or
    /// closing. From `Failed` this is a manual restart with a fresh retry
    /// budget. Returns whether an attempt was started.
    pub fn start(&mut self) -> bool {
        if self.connect_in_flight
            || matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
            )
        {
            tracing::debug!(state = %self.state, "start ignored: connection already active");
            return false;
        }

        if self.state.is_terminal() {
            tracing::info!("manual restart after exhausted retries");
            self.retry_count = 0;
        }
        self.shutdown_requested = false;
        self.cancel_pending_retry();
        self.connect();
        true
    }

    /// Deliberately close. Cancels any pending retry and closes the live
    /// connection with the reserved normal code, so no retry follows.
    pub fn shutdown(&mut self) {
        self.shutdown_requested = true;
        self.cancel_pending_retry();

        if let Some(live) = self.live.as_mut() {
            tracing::info!(connection = %live.id, "closing connection");
            live.handle.close(CloseCode::NORMAL);
            self.set_state(ConnectionState::Closing);
        } else if !matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            self.set_state(ConnectionState::Closed);
        }
    }

    /// Replace the desired channel set. While open, the full set is sent
    /// immediately (an empty set clears the server-side subscription).
    pub fn on_selection_changed(&mut self, desired: BTreeSet<String>) {
        tracing::debug!(channels = desired.len(), "selection changed");
        self.subscription.set_desired(desired);

        if self.state.is_open() {
            let request = self.subscription.listen_request();
            self.send(&request);
        }
    }

    // ── Events ───────────────────────────────────────────────────

    /// Feed one notice from a connection task.
    pub fn handle_transport(&mut self, notice: TransportNotice) {
        if self.connection_id() != Some(notice.id) {
            tracing::debug!(
                connection = %notice.id,
                event = ?notice.event,
                "ignoring notice from a superseded connection"
            );
            return;
        }

        match notice.event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Closed { code, reason } => self.on_close(code, &reason),
            TransportEvent::Failed { reason } => {
                tracing::warn!(connection = %notice.id, reason = %reason, "connection failed");
                self.on_close(CloseCode::ABNORMAL, &reason);
            }
        }
    }

    /// A scheduled retry is due. Stale or cancelled tickets are ignored.
    pub fn handle_retry_due(&mut self, ticket: RetryTicket) {
        let matches = self
            .pending_retry
            .as_ref()
            .is_some_and(|pending| pending.ticket == ticket && !pending.is_cancelled());
        if !matches {
            tracing::debug!(%ticket, "ignoring stale retry");
            return;
        }

        if let Some(pending) = self.pending_retry.take() {
            tracing::info!(attempt = pending.attempt, "retrying connection");
        }
        self.connect();
    }

    // ── Internals ────────────────────────────────────────────────

    fn connect(&mut self) {
        self.last_id = self.last_id.next();
        let id = self.last_id;
        tracing::debug!(connection = %id, "starting connection attempt");

        self.connect_in_flight = true;
        let handle = self.connector.connect(id);
        // Replacing the previous handle drops (and closes) it.
        self.live = Some(LiveConnection { id, handle });
        self.set_state(ConnectionState::Connecting);
    }

    fn on_open(&mut self) {
        self.connect_in_flight = false;
        self.retry_count = 0;

        if self.shutdown_requested {
            // Close was queued before the handshake finished.
            self.set_state(ConnectionState::Closing);
            return;
        }

        self.set_state(ConnectionState::Open);
        if let Some(request) = self.subscription.resubscribe_request() {
            self.send(&request);
        }
    }

    fn on_message(&mut self, text: &str) {
        let message = match logtail_api::decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                self.sink.on_decode_error(&e);
                return;
            }
        };

        if !message.status.is_ok() {
            let notification = ProtocolNotification::from_message(&message);
            tracing::info!(notification = %notification, "server notification");
            self.sink.on_notification(&notification);
            return;
        }

        match message.body {
            InboundBody::ChannelList { channels } => {
                tracing::debug!(count = channels.len(), "channel list received");
                let options = self.subscription.on_channel_list_received(channels);
                self.sink.refresh_channel_options(&options);
            }
            InboundBody::Event { fields } => self.sink.render_event(&fields),
            InboundBody::Unknown { type_tag } => {
                tracing::warn!(
                    type_tag = type_tag.as_deref().unwrap_or("<missing>"),
                    "unhandled message type"
                );
                self.sink.on_unhandled(type_tag.as_deref());
            }
        }
    }

    fn on_close(&mut self, code: CloseCode, reason: &str) {
        tracing::info!(code = %code, reason = %reason, "connection closed");
        self.connect_in_flight = false;
        self.live = None;
        self.set_state(ConnectionState::Closed);

        if self.shutdown_requested || code.is_normal() {
            return;
        }

        if !self.policy.allows(self.retry_count) {
            tracing::error!(attempts = self.retry_count, "giving up on reconnecting");
            self.set_state(ConnectionState::Failed);
            self.sink.report_error(&CoreError::RetryExhausted {
                attempts: self.retry_count,
            });
            return;
        }

        self.retry_count += 1;
        let attempt = self.retry_count;
        let delay = self.policy.delay_for(attempt);
        self.last_ticket = self.last_ticket.next();
        let ticket = self.last_ticket;

        tracing::info!(attempt, delay = ?delay, "scheduling reconnect");
        let cancel = self.scheduler.schedule(ticket, delay);
        self.pending_retry = Some(ScheduledRetry::new(ticket, attempt, delay, cancel));
        self.set_state(ConnectionState::Retrying { attempt });
    }

    fn send(&mut self, message: &OutboundMessage) {
        let Some(live) = self.live.as_mut() else {
            tracing::debug!("no live connection, request not sent");
            return;
        };
        let frame = match logtail_api::encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode request");
                return;
            }
        };
        if let Err(e) = live.handle.send_text(frame) {
            // The connection task is gone; its terminal notice drives recovery.
            if e.is_transient() {
                tracing::debug!(connection = %live.id, error = %e, "request not sent");
            } else {
                tracing::warn!(connection = %live.id, error = %e, "request not sent");
            }
        }
    }

    fn cancel_pending_retry(&mut self) {
        if let Some(pending) = self.pending_retry.take() {
            tracing::debug!(ticket = %pending.ticket, "cancelling pending retry");
            pending.cancel();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "connection state changed");
        self.state = state;
        self.sink.notify_connection_status(&self.state);
    }
}

impl<C: Connector, R: RetryScheduler, S: EventSink> Drop for LifecycleManager<C, R, S> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_retry.take() {
            pending.cancel();
        }
        if let Some(live) = self.live.as_mut() {
            live.handle.close(CloseCode::NORMAL);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    use logtail_api::{DecodeError, EventFields};

    use super::*;

    // ── Fakes ────────────────────────────────────────────────────

    #[derive(Debug, Default)]
    struct Wire {
        connects: Vec<ConnectionId>,
        sent: Vec<(ConnectionId, String)>,
        closed: Vec<(ConnectionId, CloseCode)>,
    }

    type SharedWire = Rc<RefCell<Wire>>;

    struct FakeConnection {
        id: ConnectionId,
        wire: SharedWire,
    }

    impl Connection for FakeConnection {
        fn send_text(&mut self, text: String) -> Result<(), logtail_api::Error> {
            self.wire.borrow_mut().sent.push((self.id, text));
            Ok(())
        }

        fn close(&mut self, code: CloseCode) {
            self.wire.borrow_mut().closed.push((self.id, code));
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        wire: SharedWire,
    }

    impl Connector for FakeConnector {
        type Connection = FakeConnection;

        fn connect(&mut self, id: ConnectionId) -> FakeConnection {
            self.wire.borrow_mut().connects.push(id);
            FakeConnection {
                id,
                wire: Rc::clone(&self.wire),
            }
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Rc<RefCell<Vec<(RetryTicket, Duration, CancellationToken)>>>,
    }

    impl RetryScheduler for RecordingScheduler {
        fn schedule(&mut self, ticket: RetryTicket, delay: Duration) -> CancellationToken {
            let token = CancellationToken::new();
            self.scheduled
                .borrow_mut()
                .push((ticket, delay, token.clone()));
            token
        }
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: Vec<EventFields>,
        options: Vec<ChannelOptions>,
        states: Vec<ConnectionState>,
        notifications: Vec<ProtocolNotification>,
        errors: Vec<String>,
        unhandled: Vec<Option<String>>,
        decode_errors: Vec<DecodeError>,
    }

    impl EventSink for RecordingSink {
        fn render_event(&mut self, fields: &EventFields) {
            self.events.push(fields.clone());
        }

        fn refresh_channel_options(&mut self, options: &ChannelOptions) {
            self.options.push(options.clone());
        }

        fn notify_connection_status(&mut self, state: &ConnectionState) {
            self.states.push(state.clone());
        }

        fn on_notification(&mut self, notification: &ProtocolNotification) {
            self.notifications.push(notification.clone());
        }

        fn report_error(&mut self, error: &CoreError) {
            self.errors.push(error.to_string());
        }

        fn on_unhandled(&mut self, type_tag: Option<&str>) {
            self.unhandled.push(type_tag.map(str::to_owned));
        }

        fn on_decode_error(&mut self, error: &DecodeError) {
            self.decode_errors.push(error.clone());
        }
    }

    type Manager = LifecycleManager<FakeConnector, RecordingScheduler, RecordingSink>;

    struct Harness {
        manager: Manager,
        wire: SharedWire,
        scheduled: Rc<RefCell<Vec<(RetryTicket, Duration, CancellationToken)>>>,
    }

    impl Harness {
        fn new(desired: &[&str]) -> Self {
            let connector = FakeConnector::default();
            let scheduler = RecordingScheduler::default();
            let wire = Rc::clone(&connector.wire);
            let scheduled = Rc::clone(&scheduler.scheduled);
            let manager = LifecycleManager::new(
                connector,
                scheduler,
                RecordingSink::default(),
                RetryPolicy::default(),
                desired.iter().map(|s| (*s).to_owned()).collect(),
            );
            Self {
                manager,
                wire,
                scheduled,
            }
        }

        fn current(&self) -> ConnectionId {
            self.manager.connection_id().unwrap()
        }

        fn deliver(&mut self, event: TransportEvent) {
            let id = self.current();
            self.manager.handle_transport(TransportNotice { id, event });
        }

        fn open(&mut self) {
            self.deliver(TransportEvent::Opened);
        }

        fn receive(&mut self, frame: &str) {
            self.deliver(TransportEvent::Message(frame.to_owned()));
        }

        fn close(&mut self, code: u16) {
            self.deliver(TransportEvent::Closed {
                code: CloseCode::new(code),
                reason: String::new(),
            });
        }

        fn fire_latest_retry(&mut self) {
            let ticket = self.scheduled.borrow().last().unwrap().0;
            self.manager.handle_retry_due(ticket);
        }

        fn delays_ms(&self) -> Vec<u128> {
            self.scheduled
                .borrow()
                .iter()
                .map(|(_, delay, _)| delay.as_millis())
                .collect()
        }

        fn sent(&self) -> Vec<String> {
            self.wire
                .borrow()
                .sent
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    #[test]
    fn start_connects_and_open_reports_state() {
        let mut h = Harness::new(&[]);
        assert_eq!(h.manager.state(), &ConnectionState::Idle);

        assert!(h.manager.start());
        assert_eq!(h.manager.state(), &ConnectionState::Connecting);
        h.open();

        assert_eq!(h.manager.state(), &ConnectionState::Open);
        assert_eq!(
            h.manager.sink().states,
            vec![ConnectionState::Connecting, ConnectionState::Open]
        );
        assert!(h.sent().is_empty(), "nothing desired, nothing sent");
    }

    #[test]
    fn second_start_while_connecting_is_ignored() {
        let mut h = Harness::new(&[]);
        assert!(h.manager.start());
        assert!(!h.manager.start());
        assert_eq!(h.wire.borrow().connects.len(), 1);

        h.open();
        assert!(!h.manager.start());
        assert_eq!(h.wire.borrow().connects.len(), 1);
    }

    #[test]
    fn selection_while_disconnected_sends_once_on_open() {
        let mut h = Harness::new(&[]);
        h.manager.on_selection_changed(set(&["#a"]));
        h.manager.on_selection_changed(set(&["#a", "#b"]));
        assert!(h.sent().is_empty());

        h.manager.start();
        h.manager.on_selection_changed(set(&["#b", "#c"]));
        assert!(h.sent().is_empty(), "still connecting");

        h.open();
        assert_eq!(
            h.sent(),
            vec![r##"{"_type":"listen_request","channels":["#b","#c"]}"##.to_owned()]
        );
    }

    #[test]
    fn same_selection_twice_sends_two_identical_frames() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();

        h.manager.on_selection_changed(set(&["#x"]));
        h.manager.on_selection_changed(set(&["#x"]));

        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[test]
    fn clearing_selection_while_open_sends_empty_request() {
        let mut h = Harness::new(&["#x"]);
        h.manager.start();
        h.open();
        h.manager.on_selection_changed(BTreeSet::new());

        assert_eq!(
            h.sent().last().unwrap(),
            r#"{"_type":"listen_request","channels":[]}"#
        );
    }

    // ── Retry ────────────────────────────────────────────────────

    #[test]
    fn backoff_is_5_10_15_seconds_then_failed() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();

        h.close(1006);
        assert_eq!(
            h.manager.state(),
            &ConnectionState::Retrying { attempt: 1 }
        );

        for _ in 0..3 {
            h.fire_latest_retry();
            assert_eq!(h.manager.state(), &ConnectionState::Connecting);
            h.deliver(TransportEvent::Failed {
                reason: "refused".into(),
            });
        }

        assert_eq!(h.delays_ms(), vec![5_000, 10_000, 15_000]);
        assert_eq!(h.manager.state(), &ConnectionState::Failed);
        assert_eq!(
            h.manager.sink().errors,
            vec!["Connection lost and 3 reconnect attempts failed".to_owned()]
        );
        // Initial connect plus three retries; no fourth.
        assert_eq!(h.wire.borrow().connects.len(), 4);
    }

    #[test]
    fn normal_close_never_schedules_retry() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.close(1000);

        assert_eq!(h.manager.state(), &ConnectionState::Closed);
        assert!(h.scheduled.borrow().is_empty());
        assert!(h.manager.pending_retry().is_none());
    }

    #[test]
    fn open_resets_retry_counter() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.close(1001);
        h.fire_latest_retry();
        assert_eq!(h.manager.retry_count(), 1);

        h.open();
        assert_eq!(h.manager.retry_count(), 0);

        h.close(1001);
        assert_eq!(h.delays_ms(), vec![5_000, 5_000]);
    }

    #[test]
    fn reconnect_resubscribes_full_desired_set() {
        let mut h = Harness::new(&["#a", "#b"]);
        h.manager.start();
        h.open();
        h.close(1006);
        h.fire_latest_retry();
        h.open();

        let wire = h.wire.borrow();
        assert_eq!(wire.sent.len(), 2);
        assert_eq!(wire.sent[0].1, wire.sent[1].1);
        assert_ne!(wire.sent[0].0, wire.sent[1].0);
    }

    #[test]
    fn shutdown_cancels_pending_retry() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.close(1006);
        let token = h.scheduled.borrow()[0].2.clone();

        h.manager.shutdown();
        assert!(token.is_cancelled());
        assert_eq!(h.manager.state(), &ConnectionState::Closed);

        // A late wake-up for the cancelled ticket does nothing.
        h.manager.handle_retry_due(h.scheduled.borrow()[0].0);
        assert_eq!(h.wire.borrow().connects.len(), 1);
    }

    #[test]
    fn stale_retry_ticket_is_ignored() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.manager.handle_retry_due(RetryTicket::new(42));
        assert_eq!(h.wire.borrow().connects.len(), 1);
        assert_eq!(h.manager.state(), &ConnectionState::Connecting);
    }

    #[test]
    fn shutdown_closes_with_normal_code_and_does_not_retry() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        let id = h.current();

        h.manager.shutdown();
        assert_eq!(h.manager.state(), &ConnectionState::Closing);
        assert_eq!(h.wire.borrow().closed, vec![(id, CloseCode::NORMAL)]);

        // Even if the server answers with another code.
        h.close(1001);
        assert_eq!(h.manager.state(), &ConnectionState::Closed);
        assert!(h.scheduled.borrow().is_empty());
    }

    #[test]
    fn drop_closes_live_connection() {
        let h = Harness::new(&[]);
        let wire = Rc::clone(&h.wire);
        let mut manager = h.manager;
        manager.start();
        drop(manager);

        assert_eq!(
            wire.borrow().closed,
            vec![(ConnectionId::new(1), CloseCode::NORMAL)]
        );
    }

    #[test]
    fn manual_start_after_failure_gets_fresh_budget() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        for _ in 0..3 {
            h.close(1006);
            h.fire_latest_retry();
        }
        h.close(1006);
        assert_eq!(h.manager.state(), &ConnectionState::Failed);

        assert!(h.manager.start());
        h.close(1006);
        assert_eq!(
            h.manager.state(),
            &ConnectionState::Retrying { attempt: 1 }
        );
    }

    #[test]
    fn notices_from_superseded_connections_are_ignored() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.close(1006);
        h.fire_latest_retry();
        assert_eq!(h.current(), ConnectionId::new(2));

        h.manager.handle_transport(TransportNotice {
            id: ConnectionId::new(1),
            event: TransportEvent::Opened,
        });
        assert_eq!(h.manager.state(), &ConnectionState::Connecting);
    }

    // ── Dispatch ─────────────────────────────────────────────────

    #[test]
    fn channel_list_refresh_preserves_selection() {
        let mut h = Harness::new(&["b"]);
        h.manager.start();
        h.open();
        h.receive(r#"{"_status":"ok","_type":"channel_list","channels":["a","b"]}"#);

        let options = h.manager.sink().options.last().unwrap().clone();
        assert!(options.is_selected("b"));
        assert!(!options.is_selected("a"));
        assert_eq!(options.available, vec!["a".to_owned(), "b".to_owned()]);
        // A channel list never produces a request beyond the open resubscribe.
        assert_eq!(h.sent().len(), 1);
    }

    #[test]
    fn event_fields_exclude_control_keys() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.receive(
            r#"{"_status":"ok","_type":"event","timestamp":"10:00","message":"hello"}"#,
        );

        let events = &h.manager.sink().events;
        assert_eq!(events.len(), 1);
        let keys: Vec<_> = events[0].keys().cloned().collect();
        assert_eq!(keys, vec!["timestamp".to_owned(), "message".to_owned()]);
    }

    #[test]
    fn error_status_only_reaches_notification_hook() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.receive(r#"{"_status":"error","_type":"event","message":"nope"}"#);

        let sink = h.manager.sink();
        assert!(sink.events.is_empty());
        assert!(sink.options.is_empty());
        assert_eq!(sink.notifications.len(), 1);
        assert_eq!(sink.notifications[0].status.as_deref(), Some("error"));
        assert_eq!(h.manager.state(), &ConnectionState::Open);
    }

    #[test]
    fn error_status_with_invalid_body_reaches_notification_hook() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.receive(r#"{"_status":"error","_type":"channel_list","errorMsg":"denied"}"#);

        let sink = h.manager.sink();
        assert!(sink.decode_errors.is_empty());
        assert!(sink.options.is_empty());
        assert_eq!(sink.notifications.len(), 1);
        assert_eq!(sink.notifications[0].detail.as_deref(), Some("denied"));
        assert_eq!(h.manager.state(), &ConnectionState::Open);
    }

    #[test]
    fn unknown_and_malformed_frames_leave_state_alone() {
        let mut h = Harness::new(&[]);
        h.manager.start();
        h.open();
        h.receive(r#"{"_status":"ok","_type":"heartbeat"}"#);
        h.receive("not json");

        let sink = h.manager.sink();
        assert_eq!(sink.unhandled, vec![Some("heartbeat".to_owned())]);
        assert_eq!(sink.decode_errors.len(), 1);
        assert_eq!(h.manager.state(), &ConnectionState::Open);
    }

    #[test]
    fn state_display_and_labels() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(
            ConnectionState::Retrying { attempt: 2 }.to_string(),
            "retrying (attempt 2)"
        );
        assert_eq!(ConnectionState::Retrying { attempt: 2 }.label(), "retrying");
        assert!(ConnectionState::Failed.is_terminal());
    }
}
