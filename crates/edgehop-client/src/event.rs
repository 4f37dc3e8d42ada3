//! The event plumbing the session engine runs on.
//!
//! Collaborators (transport, screen adapter, timers) never call into the
//! state machine directly. They post [`SessionEvent`]s, and a single driver
//! drains them one at a time into `Client::handle_event`, so every handler
//! runs to completion before the next starts.
//!
//! [`EventBus`] is the explicit event-loop handle: it owns the pending event
//! queue, the set of event kinds the session is currently subscribed to, the
//! single one-shot handshake timer, and the outbound lifecycle events. There
//! is no global registry; whoever owns the bus owns the loop.
//!
//! Collaborators running outside the driver (the TCP transport's reader
//! task, a platform screen adapter) get an [`EventSink`] instead: a channel
//! sender whose receiver the driver forwards into the bus.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use edgehop_core::ClipboardId;
use tokio::sync::mpsc;

use crate::screen::GameDeviceId;

/// Channel sender handed to collaborators that post events from outside the
/// driver loop.
pub type EventSink = mpsc::UnboundedSender<SessionEvent>;

/// Creates the sink/receiver pair the driver forwards into the bus.
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<SessionEvent>) {
    mpsc::unbounded_channel()
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Everything that can wake the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport finished connecting.
    TransportConnected,
    /// The transport could not connect.
    TransportConnectFailed { reason: String },
    /// The stream has inbound bytes buffered.
    StreamInputReady,
    /// A write failed after the connection was established.
    StreamOutputError { reason: String },
    /// The peer shut down its writing side.
    StreamInputShutdown,
    /// Our writing side was shut down.
    StreamOutputShutdown,
    /// The connection dropped.
    StreamDisconnected,
    /// The one-shot handshake timer elapsed.
    ConnectTimeout { timer: u64 },
    /// The host OS is about to sleep.
    ScreenSuspend,
    /// The host OS woke up.
    ScreenResume,
    /// The local screen's geometry changed.
    ScreenShapeChanged,
    /// The local screen took ownership of a clipboard.
    ClipboardGrabbed { id: ClipboardId },
    /// The screen answered a game-device timing request.
    GameDeviceTimingResp { freq: u16 },
    /// The screen reported game-device haptic feedback state.
    GameDeviceFeedback { device: GameDeviceId, motor1: u16, motor2: u16 },
}

/// Subscription key: the discriminant of a [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TransportConnected,
    TransportConnectFailed,
    StreamInputReady,
    StreamOutputError,
    StreamInputShutdown,
    StreamOutputShutdown,
    StreamDisconnected,
    ConnectTimeout,
    ScreenSuspend,
    ScreenResume,
    ScreenShapeChanged,
    ClipboardGrabbed,
    GameDeviceTimingResp,
    GameDeviceFeedback,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::TransportConnected => EventKind::TransportConnected,
            SessionEvent::TransportConnectFailed { .. } => EventKind::TransportConnectFailed,
            SessionEvent::StreamInputReady => EventKind::StreamInputReady,
            SessionEvent::StreamOutputError { .. } => EventKind::StreamOutputError,
            SessionEvent::StreamInputShutdown => EventKind::StreamInputShutdown,
            SessionEvent::StreamOutputShutdown => EventKind::StreamOutputShutdown,
            SessionEvent::StreamDisconnected => EventKind::StreamDisconnected,
            SessionEvent::ConnectTimeout { .. } => EventKind::ConnectTimeout,
            SessionEvent::ScreenSuspend => EventKind::ScreenSuspend,
            SessionEvent::ScreenResume => EventKind::ScreenResume,
            SessionEvent::ScreenShapeChanged => EventKind::ScreenShapeChanged,
            SessionEvent::ClipboardGrabbed { .. } => EventKind::ClipboardGrabbed,
            SessionEvent::GameDeviceTimingResp { .. } => EventKind::GameDeviceTimingResp,
            SessionEvent::GameDeviceFeedback { .. } => EventKind::GameDeviceFeedback,
        }
    }
}

/// Public lifecycle outputs of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Handshake complete; the screen is enabled.
    Connected,
    /// The session could not be (or stay) established before it was ready.
    ConnectionFailed { message: String, retry: bool },
    /// An established session ended.
    Disconnected,
}

// ── Bus ───────────────────────────────────────────────────────────────────────

/// The explicit event-loop handle.
///
/// The driver posts inbound events, fires the timer when its deadline
/// passes, and drains pending events into the session. The session
/// subscribes and unsubscribes event kinds as it moves between states;
/// events arriving for an unsubscribed kind are dropped on delivery, which
/// is what makes teardown safe against stragglers from dead collaborators.
#[derive(Debug, Default)]
pub struct EventBus {
    pending: VecDeque<SessionEvent>,
    subscriptions: HashSet<EventKind>,
    /// Armed one-shot timer: (generation id, deadline).
    timer: Option<(u64, Instant)>,
    next_timer_id: u64,
    emitted: Vec<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Subscriptions ─────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, kind: EventKind) {
        self.subscriptions.insert(kind);
    }

    pub fn unsubscribe(&mut self, kind: EventKind) {
        self.subscriptions.remove(&kind);
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.subscriptions.contains(&kind)
    }

    /// Number of live subscriptions. Zero after a full teardown.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // ── Event queue ───────────────────────────────────────────────────────────

    /// Queues an event for delivery after the current handler returns.
    pub fn post(&mut self, event: SessionEvent) {
        self.pending.push_back(event);
    }

    /// Pops the next pending event, oldest first.
    pub fn take_event(&mut self) -> Option<SessionEvent> {
        self.pending.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    // ── Timer ─────────────────────────────────────────────────────────────────

    /// Arms the one-shot timer and subscribes its event kind.
    ///
    /// At most one timer exists at a time; arming while armed replaces the
    /// deadline and invalidates the previous generation.
    pub fn arm_timer(&mut self, delay: Duration) -> u64 {
        self.next_timer_id += 1;
        let id = self.next_timer_id;
        self.timer = Some((id, Instant::now() + delay));
        self.subscribe(EventKind::ConnectTimeout);
        id
    }

    /// Disarms the timer, unsubscribes its kind, and drops any timeout event
    /// still sitting in the queue.
    pub fn cancel_timer(&mut self) {
        self.timer = None;
        self.unsubscribe(EventKind::ConnectTimeout);
        self.pending
            .retain(|event| event.kind() != EventKind::ConnectTimeout);
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.map(|(_, deadline)| deadline)
    }

    /// Posts the timeout event and disarms, if the deadline has passed.
    ///
    /// The subscription stays; the session removes it when it cleans the
    /// timer up, exactly like any other handler it registered.
    pub fn fire_timer_if_due(&mut self, now: Instant) -> bool {
        match self.timer {
            Some((id, deadline)) if now >= deadline => {
                self.timer = None;
                self.post(SessionEvent::ConnectTimeout { timer: id });
                true
            }
            _ => false,
        }
    }

    // ── Lifecycle outputs ─────────────────────────────────────────────────────

    pub fn emit(&mut self, event: ClientEvent) {
        self.emitted.push(event);
    }

    /// Drains the lifecycle events produced since the last call.
    pub fn take_client_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.emitted)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
