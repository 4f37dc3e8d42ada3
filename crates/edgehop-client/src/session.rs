//! The client session: connection lifecycle, input/clipboard dispatch, and
//! suspend/resume.
//!
//! One [`Client`] exists per process. It walks the states
//!
//! ```text
//! Idle ──► Resolving ──► Connecting ──► AwaitingHello ──► Active
//!   ▲          │              │               │              │
//!   └──────────┴──────── Terminating ◄────────┴──────────────┘
//! ```
//!
//! driven entirely by [`SessionEvent`]s handed to [`Client::handle_event`]
//! by the bus driver. Every state owns a set of subscriptions and (for the
//! connecting states) the single 15 second handshake timer; each `setup_*`
//! has a matching `cleanup_*` that runs on every exit path, so a full
//! teardown always returns the bus to a net-zero subscription count.
//!
//! Lifecycle results surface as [`ClientEvent`]s: `Connected` once the
//! handshake completes, `ConnectionFailed` (always with the retry hint set)
//! when a session dies before it was ready, `Disconnected` when an
//! established session ends.

use std::rc::Rc;
use std::time::Duration;

use edgehop_core::protocol::{decode_hello, encode_hello_back, ProtocolVersion};
use edgehop_core::{ClipboardData, ClipboardId, ClipboardLedger};
use tracing::{debug, info, warn};

use crate::event::{ClientEvent, EventBus, EventKind, EventSink, SessionEvent};
use crate::proxy::{ClientTarget, ServerProxy, ServerProxyFactory};
use crate::screen::{
    GameDeviceId, KeyButton, KeyId, ModifierMask, MouseButton, Screen, ScreenOption, ScreenShape,
};
use crate::stream::{
    CryptoLayer, PacketLayer, ResolvedEndpoint, ServerEndpoint, Stream, StreamCipherFactory,
    StreamFilterFactory, TransportFactory,
};

/// One timer covers transport connect and handshake together; it is not
/// re-armed when the transport comes up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

// ── State ─────────────────────────────────────────────────────────────────────

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection and none in progress.
    #[default]
    Idle,
    /// Resolving the server address (synchronous, inside `connect`).
    Resolving,
    /// Pipeline built, waiting for the transport to come up.
    Connecting,
    /// Transport up, waiting for the server's `Hello`.
    AwaitingHello,
    /// Handshake complete; the server proxy owns the wire.
    Active,
    /// Tearing down (transient, inside a handler).
    Terminating,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Resolving => "Resolving",
            SessionState::Connecting => "Connecting",
            SessionState::AwaitingHello => "AwaitingHello",
            SessionState::Active => "Active",
            SessionState::Terminating => "Terminating",
        };
        write!(f, "{name}")
    }
}

/// Static configuration of a session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name announced in the `HelloBack`.
    pub name: String,
    /// Where the server lives; cloned here, re-resolved per attempt.
    pub endpoint: ServerEndpoint,
}

// ── Dispatch core ─────────────────────────────────────────────────────────────

/// The screen-facing half of the session: everything the server proxy is
/// allowed to touch while it holds the stream.
///
/// Keeping this separate from the stream and proxy lets the proxy borrow it
/// mutably during `handle_frame` without aliasing either of them. Outbound
/// clipboard payloads produced inside a proxy callback (the leave flush) are
/// parked in `outbox` and transmitted when the callback returns.
struct DispatchCore {
    screen: Rc<dyn Screen>,
    ledger: ClipboardLedger,
    /// True while the server's cursor is on this screen.
    active: bool,
    outbox: Vec<(ClipboardId, ClipboardData)>,
}

impl DispatchCore {
    /// Reads a clipboard from the screen and runs the ledger's change
    /// detection. Returns the contents only when they must be transmitted.
    fn collect_clipboard(&mut self, id: ClipboardId) -> Option<ClipboardData> {
        // Announce the timestamp we last saw; the screen skips conversion
        // when nothing changed.
        let expected = self.ledger.last_seen(id);
        let contents = self.screen.read_clipboard(id, expected);
        if !self.ledger.needs_marshal(id, contents.time) {
            return None;
        }
        let marshalled = contents.data.marshal();
        if self.ledger.commit(id, contents.time, &marshalled) {
            Some(contents.data)
        } else {
            None
        }
    }
}

impl ClientTarget for DispatchCore {
    fn enter(&mut self, x: i32, y: i32, _seq_num: u32, mask: ModifierMask, _for_screensaver: bool) {
        self.active = true;
        self.screen.mouse_move(x, y);
        self.screen.enter(mask);
    }

    fn leave(&mut self) {
        self.screen.leave();
        self.active = false;

        // Flush clipboards we own; the ledger suppresses unchanged contents.
        for id in ClipboardId::ALL {
            if self.ledger.owned(id) {
                if let Some(data) = self.collect_clipboard(id) {
                    self.outbox.push((id, data));
                }
            }
        }
    }

    fn set_clipboard(&mut self, id: ClipboardId, data: &ClipboardData) {
        self.screen.set_clipboard(id, data);
        self.ledger.remote_set(id);
    }

    fn grab_clipboard(&mut self, id: ClipboardId) {
        self.screen.grab_clipboard(id);
        self.ledger.remote_grab(id);
    }

    fn set_clipboard_dirty(&mut self, _id: ClipboardId, _dirty: bool) {
        panic!("set_clipboard_dirty is never valid on the client side");
    }

    fn key_down(&mut self, key: KeyId, mask: ModifierMask, button: KeyButton) {
        self.screen.key_down(key, mask, button);
    }

    fn key_repeat(&mut self, key: KeyId, mask: ModifierMask, count: i32, button: KeyButton) {
        self.screen.key_repeat(key, mask, count, button);
    }

    fn key_up(&mut self, key: KeyId, mask: ModifierMask, button: KeyButton) {
        self.screen.key_up(key, mask, button);
    }

    fn mouse_down(&mut self, button: MouseButton) {
        self.screen.mouse_down(button);
    }

    fn mouse_up(&mut self, button: MouseButton) {
        self.screen.mouse_up(button);
    }

    fn mouse_move(&mut self, x: i32, y: i32) {
        self.screen.mouse_move(x, y);
    }

    fn mouse_relative_move(&mut self, dx: i32, dy: i32) {
        self.screen.mouse_relative_move(dx, dy);
    }

    fn mouse_wheel(&mut self, x_delta: i32, y_delta: i32) {
        self.screen.mouse_wheel(x_delta, y_delta);
    }

    fn screensaver(&mut self, activate: bool) {
        self.screen.screensaver(activate);
    }

    fn reset_options(&mut self) {
        self.screen.reset_options();
    }

    fn set_options(&mut self, options: &[ScreenOption]) {
        self.screen.set_options(options);
    }

    fn game_device_buttons(&mut self, device: GameDeviceId, buttons: u16) {
        self.screen.game_device_buttons(device, buttons);
    }

    fn game_device_sticks(&mut self, device: GameDeviceId, x1: i16, y1: i16, x2: i16, y2: i16) {
        self.screen.game_device_sticks(device, x1, y1, x2, y2);
    }

    fn game_device_triggers(&mut self, device: GameDeviceId, t1: u8, t2: u8) {
        self.screen.game_device_triggers(device, t1, t2);
    }

    fn game_device_timing_req(&mut self) {
        self.screen.game_device_timing_req();
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// The client session.
pub struct Client {
    name: String,
    endpoint: ServerEndpoint,
    transport_factory: Box<dyn TransportFactory>,
    filter_factory: Option<Box<dyn StreamFilterFactory>>,
    cipher_factory: Option<Box<dyn StreamCipherFactory>>,
    proxy_factory: Box<dyn ServerProxyFactory>,
    /// Handed to each transport so its tasks can post signals.
    sink: EventSink,
    state: SessionState,
    stream: Option<Box<dyn Stream>>,
    server: Option<Box<dyn ServerProxy>>,
    core: DispatchCore,
    /// Handshake complete and the screen enabled.
    ready: bool,
    suspended: bool,
    connect_on_resume: bool,
}

impl Client {
    /// Creates the session and registers its always-on subscriptions
    /// (suspend/resume and the game-device report events).
    ///
    /// The screen is shared with the platform driver and outlives the
    /// session; factories are owned and die with it.
    pub fn new(
        bus: &mut EventBus,
        sink: EventSink,
        config: ClientConfig,
        screen: Rc<dyn Screen>,
        transport_factory: Box<dyn TransportFactory>,
        proxy_factory: Box<dyn ServerProxyFactory>,
    ) -> Self {
        bus.subscribe(EventKind::ScreenSuspend);
        bus.subscribe(EventKind::ScreenResume);
        bus.subscribe(EventKind::GameDeviceTimingResp);
        bus.subscribe(EventKind::GameDeviceFeedback);

        Self {
            name: config.name,
            endpoint: config.endpoint,
            transport_factory,
            filter_factory: None,
            cipher_factory: None,
            proxy_factory,
            sink,
            state: SessionState::Idle,
            stream: None,
            server: None,
            core: DispatchCore {
                screen,
                ledger: ClipboardLedger::new(),
                active: false,
                outbox: Vec::new(),
            },
            ready: false,
            suspended: false,
            connect_on_resume: false,
        }
    }

    /// Installs a user stream filter, applied between the transport and the
    /// packet layer on every connect.
    pub fn with_filter(mut self, factory: Box<dyn StreamFilterFactory>) -> Self {
        self.filter_factory = Some(factory);
        self
    }

    /// Enables encryption with the given cipher factory.
    pub fn with_cipher(mut self, factory: Box<dyn StreamCipherFactory>) -> Self {
        self.cipher_factory = Some(factory);
        self
    }

    // ── Public surface ────────────────────────────────────────────────────────

    /// Starts a connection attempt.
    ///
    /// A no-op while a stream already exists. While suspended it only
    /// records that a connect should happen on resume. Failures surface as
    /// a `ConnectionFailed` lifecycle event, never as a return value.
    pub fn connect(&mut self, bus: &mut EventBus) {
        if self.stream.is_some() {
            return;
        }
        if self.suspended {
            self.connect_on_resume = true;
            return;
        }

        // Re-resolve on every attempt: the address may have been unresolvable
        // earlier, or changed since (laptops roam).
        if matches!(self.endpoint, ServerEndpoint::Network { .. }) {
            self.state = SessionState::Resolving;
        }
        let resolved = match self.endpoint.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                self.state = SessionState::Idle;
                debug!("resolution failed");
                self.send_connection_failed(bus, &e.to_string());
                return;
            }
        };
        if let ResolvedEndpoint::Socket(addr) = &resolved {
            info!("connecting to '{}': {}", self.endpoint, addr);
        }
        self.state = SessionState::Connecting;

        // Build the pipeline bottom-up: transport, optional user filter,
        // packet framing, optional crypto.
        let mut stream: Box<dyn Stream> = self.transport_factory.create(self.sink.clone());
        if let Some(filter_factory) = &self.filter_factory {
            stream = filter_factory.create(stream);
        }
        stream = Box::new(PacketLayer::new(stream));
        if let Some(cipher_factory) = &self.cipher_factory {
            stream = Box::new(CryptoLayer::new(stream, cipher_factory.create()));
        }
        self.stream = Some(stream);

        debug!("connecting to server");
        self.setup_connecting(bus);
        self.setup_timer(bus);

        let connect_err = match self.stream.as_mut() {
            Some(stream) => stream.connect(&resolved).err(),
            None => None,
        };
        if let Some(e) = connect_err {
            self.cleanup_timer(bus);
            self.cleanup_connecting(bus);
            self.stream = None;
            self.state = SessionState::Idle;
            debug!("connection failed");
            self.send_connection_failed(bus, &e.to_string());
        }
    }

    /// Tears the session down.
    ///
    /// With a message this reports `ConnectionFailed(message)`; without one
    /// it reports `Disconnected`.
    pub fn disconnect(&mut self, bus: &mut EventBus, msg: Option<&str>) {
        self.connect_on_resume = false;
        self.state = SessionState::Terminating;
        self.cleanup_timer(bus);
        self.cleanup_screen(bus);
        self.cleanup_connecting(bus);
        self.cleanup_connection(bus);
        self.state = SessionState::Idle;
        match msg {
            Some(msg) => self.send_connection_failed(bus, msg),
            None => bus.emit(ClientEvent::Disconnected),
        }
    }

    /// Releases everything the session holds and unregisters every
    /// subscription it established, including the always-on ones.
    ///
    /// After this the bus subscription count contributed by the session is
    /// zero. No lifecycle event is emitted.
    pub fn shutdown(&mut self, bus: &mut EventBus) {
        bus.unsubscribe(EventKind::ScreenSuspend);
        bus.unsubscribe(EventKind::ScreenResume);
        bus.unsubscribe(EventKind::GameDeviceTimingResp);
        bus.unsubscribe(EventKind::GameDeviceFeedback);
        self.state = SessionState::Terminating;
        self.cleanup_timer(bus);
        self.cleanup_screen(bus);
        self.cleanup_connecting(bus);
        self.cleanup_connection(bus);
        self.state = SessionState::Idle;
    }

    /// Delivers one event. Events for kinds the session is not currently
    /// subscribed to are dropped, which makes stale signals from torn-down
    /// collaborators harmless.
    pub fn handle_event(&mut self, bus: &mut EventBus, event: SessionEvent) {
        if !bus.is_subscribed(event.kind()) {
            return;
        }
        match event {
            SessionEvent::TransportConnected => self.handle_connected(bus),
            SessionEvent::TransportConnectFailed { reason } => {
                self.handle_connect_failed(bus, reason)
            }
            SessionEvent::StreamInputReady => self.handle_input_ready(bus),
            SessionEvent::StreamOutputError { reason } => self.handle_output_error(bus, reason),
            SessionEvent::StreamInputShutdown
            | SessionEvent::StreamOutputShutdown
            | SessionEvent::StreamDisconnected => self.handle_disconnected(bus),
            SessionEvent::ConnectTimeout { .. } => self.handle_connect_timeout(bus),
            SessionEvent::ScreenSuspend => self.handle_suspend(bus),
            SessionEvent::ScreenResume => self.handle_resume(bus),
            SessionEvent::ScreenShapeChanged => self.handle_shape_changed(),
            SessionEvent::ClipboardGrabbed { id } => self.handle_clipboard_grabbed(id),
            SessionEvent::GameDeviceTimingResp { freq } => self.handle_game_timing_resp(freq),
            SessionEvent::GameDeviceFeedback {
                device,
                motor1,
                motor2,
            } => self.handle_game_feedback(device, motor1, motor2),
        }
    }

    /// Installs the inbound decryption IV on the crypto layer, if one is in
    /// the pipeline. Called by the server proxy once it has parsed the
    /// peer's IV.
    pub fn set_decrypt_iv(&mut self, iv: &[u8]) {
        if let Some(stream) = self.stream.as_mut() {
            stream.set_decrypt_iv(iv);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the server proxy exists, i.e. the session is established.
    pub fn is_connected(&self) -> bool {
        self.server.is_some()
    }

    /// True while a connect attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self.state,
            SessionState::Resolving | SessionState::Connecting | SessionState::AwaitingHello
        )
    }

    /// True once the handshake completed and the screen was enabled.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn shape(&self) -> ScreenShape {
        self.core.screen.shape()
    }

    pub fn cursor_pos(&self) -> (i32, i32) {
        self.core.screen.cursor_pos()
    }

    // ── Setup / cleanup pairs ─────────────────────────────────────────────────

    fn setup_connecting(&mut self, bus: &mut EventBus) {
        bus.subscribe(EventKind::TransportConnected);
        bus.subscribe(EventKind::TransportConnectFailed);
    }

    fn cleanup_connecting(&mut self, bus: &mut EventBus) {
        if self.stream.is_some() {
            bus.unsubscribe(EventKind::TransportConnected);
            bus.unsubscribe(EventKind::TransportConnectFailed);
        }
    }

    fn setup_connection(&mut self, bus: &mut EventBus) {
        bus.subscribe(EventKind::StreamDisconnected);
        bus.subscribe(EventKind::StreamInputReady);
        bus.subscribe(EventKind::StreamOutputError);
        bus.subscribe(EventKind::StreamInputShutdown);
        bus.subscribe(EventKind::StreamOutputShutdown);
    }

    fn cleanup_connection(&mut self, bus: &mut EventBus) {
        if let Some(mut stream) = self.stream.take() {
            bus.unsubscribe(EventKind::StreamInputReady);
            bus.unsubscribe(EventKind::StreamOutputError);
            bus.unsubscribe(EventKind::StreamInputShutdown);
            bus.unsubscribe(EventKind::StreamOutputShutdown);
            bus.unsubscribe(EventKind::StreamDisconnected);
            stream.shutdown();
        }
    }

    fn setup_screen(&mut self, bus: &mut EventBus) {
        debug_assert!(self.server.is_none());
        self.ready = false;
        self.server = Some(self.proxy_factory.create());
        bus.subscribe(EventKind::ScreenShapeChanged);
        bus.subscribe(EventKind::ClipboardGrabbed);
    }

    fn cleanup_screen(&mut self, bus: &mut EventBus) {
        if self.server.is_some() {
            if self.ready {
                self.core.screen.disable();
                self.ready = false;
            }
            bus.unsubscribe(EventKind::ScreenShapeChanged);
            bus.unsubscribe(EventKind::ClipboardGrabbed);
            // Proxy dies before the stream it was borrowing.
            self.server = None;
        }
    }

    fn setup_timer(&mut self, bus: &mut EventBus) {
        bus.arm_timer(HANDSHAKE_TIMEOUT);
    }

    fn cleanup_timer(&mut self, bus: &mut EventBus) {
        bus.cancel_timer();
    }

    // ── Event handlers ────────────────────────────────────────────────────────

    fn handle_connected(&mut self, bus: &mut EventBus) {
        debug!("connected; waiting for hello");
        self.cleanup_connecting(bus);
        self.setup_connection(bus);
        // Fresh connection, fresh clipboard state.
        self.core.ledger.reset();
        self.state = SessionState::AwaitingHello;
    }

    fn handle_connect_failed(&mut self, bus: &mut EventBus, reason: String) {
        self.state = SessionState::Terminating;
        self.cleanup_timer(bus);
        self.cleanup_connecting(bus);
        // The connection subscriptions were never set up; just drop the
        // pipeline.
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.state = SessionState::Idle;
        debug!("connection failed");
        self.send_connection_failed(bus, &reason);
    }

    fn handle_connect_timeout(&mut self, bus: &mut EventBus) {
        self.state = SessionState::Terminating;
        self.cleanup_timer(bus);
        self.cleanup_connecting(bus);
        self.cleanup_connection(bus);
        self.state = SessionState::Idle;
        debug!("connection timed out");
        self.send_connection_failed(bus, "Timed out");
    }

    fn handle_input_ready(&mut self, bus: &mut EventBus) {
        match self.state {
            SessionState::AwaitingHello => self.handle_hello(bus),
            SessionState::Active => self.handle_server_input(bus),
            _ => {}
        }
    }

    fn handle_hello(&mut self, bus: &mut EventBus) {
        let frame = match self.stream.as_mut() {
            Some(stream) => match stream.read() {
                Ok(Some(frame)) => frame,
                // A partial packet; the next input signal completes it.
                Ok(None) => return,
                Err(e) => {
                    warn!("stream error before hello: {e}");
                    self.fail_handshake(bus, "Protocol error from server");
                    return;
                }
            },
            None => return,
        };

        let server_version = match decode_hello(&frame) {
            Ok(version) => version,
            Err(e) => {
                warn!("bad hello from server: {e}");
                self.fail_handshake(bus, "Protocol error from server");
                return;
            }
        };

        debug!("got hello version {server_version}");
        if !server_version.supports(ProtocolVersion::CURRENT) {
            self.fail_handshake(bus, &format!("incompatible version {server_version}"));
            return;
        }

        debug!("say hello version {}", ProtocolVersion::CURRENT);
        let hello_back = encode_hello_back(ProtocolVersion::CURRENT, &self.name);
        let write_err = match self.stream.as_mut() {
            Some(stream) => stream.write(&hello_back).err(),
            None => return,
        };
        if let Some(e) = write_err {
            self.fail_handshake(bus, &e.to_string());
            return;
        }

        self.setup_screen(bus);
        self.cleanup_timer(bus);
        self.state = SessionState::Active;
        self.handshake_complete(bus);

        // Packets may already be buffered behind the hello; no new input
        // signal will arrive for them, so synthesize one. It is queued and
        // runs after this handler returns.
        let buffered = match self.stream.as_mut() {
            Some(stream) => stream.has_input(),
            None => false,
        };
        if buffered {
            bus.post(SessionEvent::StreamInputReady);
        }
    }

    fn handshake_complete(&mut self, bus: &mut EventBus) {
        info!("connected to server");
        self.ready = true;
        self.core.screen.enable();
        bus.emit(ClientEvent::Connected);
    }

    fn handle_server_input(&mut self, bus: &mut EventBus) {
        loop {
            let frame = match self.stream.as_mut() {
                Some(stream) => match stream.read() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stream read failed: {e}");
                        self.teardown_established(bus);
                        return;
                    }
                },
                None => return,
            };

            if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
                server.handle_frame(&frame, &mut **stream, &mut self.core);
            }
            self.flush_outbox();

            if self.state != SessionState::Active {
                return;
            }
        }
    }

    /// Transmits clipboard payloads parked by a proxy callback.
    fn flush_outbox(&mut self) {
        while !self.core.outbox.is_empty() {
            let (id, data) = self.core.outbox.remove(0);
            if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
                debug!("sending clipboard {id}");
                server.clipboard_changed(id, &data, &mut **stream);
            }
        }
    }

    fn handle_output_error(&mut self, bus: &mut EventBus, reason: String) {
        warn!("error sending to server: {reason}");
        self.teardown_established(bus);
    }

    fn handle_disconnected(&mut self, bus: &mut EventBus) {
        debug!("disconnected");
        self.teardown_established(bus);
    }

    /// Common teardown for failures after the session was established:
    /// reported as `Disconnected`, not `ConnectionFailed`.
    fn teardown_established(&mut self, bus: &mut EventBus) {
        self.state = SessionState::Terminating;
        self.cleanup_timer(bus);
        self.cleanup_screen(bus);
        self.cleanup_connection(bus);
        self.state = SessionState::Idle;
        bus.emit(ClientEvent::Disconnected);
    }

    /// Teardown for failures before the handshake finished.
    fn fail_handshake(&mut self, bus: &mut EventBus, msg: &str) {
        self.state = SessionState::Terminating;
        self.cleanup_timer(bus);
        self.cleanup_connection(bus);
        self.state = SessionState::Idle;
        self.send_connection_failed(bus, msg);
    }

    fn handle_shape_changed(&mut self) {
        debug!("resolution changed");
        let shape = self.core.screen.shape();
        let cursor = self.core.screen.cursor_pos();
        if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
            server.info_changed(shape, cursor, &mut **stream);
        }
    }

    fn handle_clipboard_grabbed(&mut self, id: ClipboardId) {
        // Ownership is announced before any payload bytes for this slot.
        if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
            server.grab_clipboard(id, &mut **stream);
        }

        self.core.ledger.local_grab(id);

        // If the server's cursor is on our screen the contents travel with
        // the next leave; otherwise ship them now.
        if !self.core.active {
            self.send_clipboard(id);
        }
    }

    fn send_clipboard(&mut self, id: ClipboardId) {
        if let Some(data) = self.core.collect_clipboard(id) {
            if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
                debug!("sending clipboard {id}");
                server.clipboard_changed(id, &data, &mut **stream);
            }
        }
    }

    fn handle_suspend(&mut self, bus: &mut EventBus) {
        info!("suspend");
        self.suspended = true;
        let was_connected = self.server.is_some();
        self.disconnect(bus, None);
        self.connect_on_resume = was_connected;
    }

    fn handle_resume(&mut self, bus: &mut EventBus) {
        info!("resume");
        self.suspended = false;
        if self.connect_on_resume {
            self.connect_on_resume = false;
            self.connect(bus);
        }
    }

    fn handle_game_timing_resp(&mut self, freq: u16) {
        if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
            server.game_device_timing_resp(freq, &mut **stream);
        }
    }

    fn handle_game_feedback(&mut self, device: GameDeviceId, motor1: u16, motor2: u16) {
        if let (Some(server), Some(stream)) = (self.server.as_mut(), self.stream.as_mut()) {
            server.game_device_feedback(device, motor1, motor2, &mut **stream);
        }
    }

    fn send_connection_failed(&mut self, bus: &mut EventBus, msg: &str) {
        // The retry hint is always set; a supervising process decides.
        bus.emit(ClientEvent::ConnectionFailed {
            message: msg.to_string(),
            retry: true,
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
