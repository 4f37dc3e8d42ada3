//! End-to-end lifecycle tests for the session engine, driven through the
//! public API with the in-tree mock collaborators: scripted server frames go
//! in through the mock transport, and the tests observe the wire image, the
//! screen journal, the proxy journal, and the emitted lifecycle events.

use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use edgehop_client::event::{event_channel, ClientEvent, EventBus, SessionEvent};
use edgehop_client::mock::{
    MockScreen, MockTransportFactory, ProxyCall, ProxyState, ScreenCall, ScriptProxyFactory,
    TargetCall, TransportState, XorCipherFactory, XorFilterFactory,
};
use edgehop_client::screen::Screen;
use edgehop_client::session::{Client, ClientConfig, SessionState};
use edgehop_client::stream::{ServerEndpoint, StreamCipher, StreamCipherFactory};
use edgehop_core::frame::encode_frame;
use edgehop_core::protocol::{encode_hello, ProtocolVersion};
use edgehop_core::{ClipboardData, ClipboardId};

/// The version 1.6 Hello frame, length prefix included.
const HELLO_V1_6: &[u8] = b"\x00\x00\x00\x0DSynergy\x00\x01\x00\x06";

struct Rig {
    bus: EventBus,
    client: Client,
    transport: Arc<TransportState>,
    proxy: Arc<ProxyState>,
    screen: Rc<MockScreen>,
}

fn rig() -> Rig {
    rig_with(|client| client)
}

/// Builds a session around the mocks, letting the caller add optional
/// pipeline layers.
fn rig_with(configure: impl FnOnce(Client) -> Client) -> Rig {
    let mut bus = EventBus::new();
    let (sink, _events) = event_channel();
    let transport_factory = MockTransportFactory::new();
    let transport = Arc::clone(&transport_factory.state);
    let proxy_factory = ScriptProxyFactory::new();
    let proxy = Arc::clone(&proxy_factory.state);
    let screen = Rc::new(MockScreen::new());
    let client = Client::new(
        &mut bus,
        sink,
        ClientConfig {
            name: "myclient".to_string(),
            endpoint: ServerEndpoint::network("127.0.0.1", 24800),
        },
        Rc::clone(&screen) as Rc<dyn Screen>,
        Box::new(transport_factory),
        Box::new(proxy_factory),
    );
    Rig {
        bus,
        client: configure(client),
        transport,
        proxy,
        screen,
    }
}

impl Rig {
    fn pump(&mut self) {
        while let Some(event) = self.bus.take_event() {
            self.client.handle_event(&mut self.bus, event);
        }
    }

    fn post(&mut self, event: SessionEvent) {
        self.bus.post(event);
        self.pump();
    }

    /// Connect, bring the transport up, and complete the handshake.
    fn establish(&mut self) {
        self.client.connect(&mut self.bus);
        self.post(SessionEvent::TransportConnected);
        self.transport.push_input(HELLO_V1_6);
        self.post(SessionEvent::StreamInputReady);
        assert_eq!(self.client.state(), SessionState::Active);
        self.bus.take_client_events();
        self.transport.clear_writes();
    }
}

// ── Scenario: happy path ──────────────────────────────────────────────────────

#[test]
fn test_happy_path_handshake() {
    // Arrange
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);
    assert_eq!(rig.client.state(), SessionState::Connecting);

    // Act: transport comes up, server says hello at version 1.6
    rig.post(SessionEvent::TransportConnected);
    assert_eq!(rig.client.state(), SessionState::AwaitingHello);
    rig.transport.push_input(HELLO_V1_6);
    rig.post(SessionEvent::StreamInputReady);

    // Assert: exact HelloBack bytes on the wire
    let mut expected = b"\x00\x00\x00\x17Synergy\x00\x01\x00\x06\x00\x00\x00\x08".to_vec();
    expected.extend_from_slice(b"myclient");
    assert_eq!(rig.transport.wire_bytes(), expected);

    // Connected reported, session ready, screen enabled.
    assert_eq!(rig.bus.take_client_events(), vec![ClientEvent::Connected]);
    assert_eq!(rig.client.state(), SessionState::Active);
    assert!(rig.client.is_ready());
    assert!(rig.client.is_connected());
    assert_eq!(rig.screen.calls(), vec![ScreenCall::Enable]);
}

#[test]
fn test_hello_split_across_reads_still_handshakes() {
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);
    rig.post(SessionEvent::TransportConnected);

    // First half of the frame: the input signal fires but no packet is
    // complete, so the session keeps waiting.
    rig.transport.push_input(&HELLO_V1_6[..7]);
    rig.post(SessionEvent::StreamInputReady);
    assert_eq!(rig.client.state(), SessionState::AwaitingHello);

    rig.transport.push_input(&HELLO_V1_6[7..]);
    rig.post(SessionEvent::StreamInputReady);
    assert_eq!(rig.client.state(), SessionState::Active);
}

#[test]
fn test_frames_behind_the_hello_are_processed() {
    // Arrange: hello and a server message arrive in one chunk
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);
    rig.post(SessionEvent::TransportConnected);

    let mut bytes = HELLO_V1_6.to_vec();
    bytes.extend_from_slice(&encode_frame(b"DMMV").unwrap());
    rig.transport.push_input(&bytes);

    // Act: a single input signal covers both
    rig.post(SessionEvent::StreamInputReady);

    // Assert: the trailing frame reached the proxy via the synthesized
    // input signal
    assert_eq!(
        rig.proxy.take_calls(),
        vec![ProxyCall::HandleFrame(b"DMMV".to_vec())]
    );
}

// ── Scenario: version gate ────────────────────────────────────────────────────

#[test]
fn test_old_server_is_rejected_without_hello_back() {
    // Arrange
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);
    rig.post(SessionEvent::TransportConnected);

    // Act: server advertises 1.2
    rig.transport
        .push_input(&encode_frame(&encode_hello(ProtocolVersion::new(1, 2))).unwrap());
    rig.post(SessionEvent::StreamInputReady);

    // Assert
    assert_eq!(
        rig.bus.take_client_events(),
        vec![ClientEvent::ConnectionFailed {
            message: "incompatible version 1.2".to_string(),
            retry: true,
        }]
    );
    assert!(rig.transport.written().is_empty(), "no HelloBack on the wire");
    assert_eq!(rig.client.state(), SessionState::Idle);
    assert!(!rig.bus.timer_armed());
}

// ── Scenario: handshake timeout ───────────────────────────────────────────────

#[test]
fn test_timeout_when_server_stays_silent() {
    // Arrange: transport up, no hello
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);
    let armed_at = Instant::now();
    let deadline = rig.bus.timer_deadline().expect("timer armed by connect");
    assert!(deadline >= armed_at + Duration::from_secs(14));
    assert!(deadline <= armed_at + Duration::from_secs(16));

    rig.post(SessionEvent::TransportConnected);

    // The timer is not re-armed when the transport comes up; one deadline
    // bounds connect plus handshake.
    assert_eq!(rig.bus.timer_deadline(), Some(deadline));

    // Act: the deadline passes
    assert!(rig.bus.fire_timer_if_due(deadline));
    rig.pump();

    // Assert
    assert_eq!(
        rig.bus.take_client_events(),
        vec![ClientEvent::ConnectionFailed {
            message: "Timed out".to_string(),
            retry: true,
        }]
    );
    assert_eq!(rig.client.state(), SessionState::Idle);
    assert_eq!(*rig.transport.shutdowns.lock().unwrap(), 1);
}

#[test]
fn test_timer_is_gone_once_active() {
    let mut rig = rig();
    rig.establish();
    assert!(!rig.bus.timer_armed());

    // A stale deadline can no longer fire.
    assert!(!rig.bus.fire_timer_if_due(Instant::now() + Duration::from_secs(60)));
}

// ── Scenario: suspend and resume ──────────────────────────────────────────────

#[test]
fn test_suspend_while_connected_then_resume_reconnects_once() {
    // Arrange
    let mut rig = rig();
    rig.establish();
    assert_eq!(rig.transport.connect_count(), 1);

    // Act: the OS goes to sleep
    rig.post(SessionEvent::ScreenSuspend);

    // Assert: established session reported closed
    assert_eq!(rig.bus.take_client_events(), vec![ClientEvent::Disconnected]);
    assert!(!rig.client.is_connected());

    // Connects attempted while suspended stay deferred.
    rig.client.connect(&mut rig.bus);
    assert_eq!(rig.transport.connect_count(), 1);

    // Act: wake up
    rig.post(SessionEvent::ScreenResume);

    // Assert: exactly one new attempt
    assert_eq!(rig.transport.connect_count(), 2);
    assert_eq!(rig.client.state(), SessionState::Connecting);
}

#[test]
fn test_suspend_while_idle_does_not_reconnect_on_resume() {
    let mut rig = rig();
    rig.post(SessionEvent::ScreenSuspend);
    rig.bus.take_client_events();

    rig.post(SessionEvent::ScreenResume);

    assert_eq!(rig.transport.connect_count(), 0);
    assert_eq!(rig.client.state(), SessionState::Idle);
}

// ── Scenario: clipboard leave-flush ───────────────────────────────────────────

#[test]
fn test_clipboard_flushes_once_on_leave_and_never_twice() {
    // Arrange: the server's cursor is on our screen
    let mut rig = rig();
    rig.establish();
    rig.proxy.push_script(TargetCall::Enter {
        x: 5,
        y: 5,
        seq_num: 1,
        mask: 0,
    });
    rig.transport.push_input(&encode_frame(b"EINC").unwrap());
    rig.post(SessionEvent::StreamInputReady);

    rig.screen.stage_clipboard(
        ClipboardId::Clipboard,
        700,
        ClipboardData::from_text("copied text"),
    );

    // Act: local grab while active; no payload may move yet
    rig.post(SessionEvent::ClipboardGrabbed {
        id: ClipboardId::Clipboard,
    });
    rig.proxy.take_calls();

    // Server leaves: the clipboard is marshalled once and transmitted.
    rig.proxy.push_script(TargetCall::Leave);
    rig.transport.push_input(&encode_frame(b"COUT").unwrap());
    rig.post(SessionEvent::StreamInputReady);

    let calls = rig.proxy.take_calls();
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, ProxyCall::ClipboardChanged(..)))
            .count(),
        1
    );
    assert!(calls.contains(&ProxyCall::ClipboardChanged(
        ClipboardId::Clipboard,
        ClipboardData::from_text("copied text")
    )));

    // Act: a second enter/leave with no new grab
    rig.proxy.push_script(TargetCall::Enter {
        x: 5,
        y: 5,
        seq_num: 2,
        mask: 0,
    });
    rig.transport.push_input(&encode_frame(b"EINC").unwrap());
    rig.post(SessionEvent::StreamInputReady);
    rig.proxy.push_script(TargetCall::Leave);
    rig.transport.push_input(&encode_frame(b"COUT").unwrap());
    rig.post(SessionEvent::StreamInputReady);

    // Assert: identical bytes are not retransmitted
    assert!(!rig
        .proxy
        .take_calls()
        .iter()
        .any(|c| matches!(c, ProxyCall::ClipboardChanged(..))));
}

// ── Scenario: protocol error ──────────────────────────────────────────────────

#[test]
fn test_garbage_first_frame_fails_the_handshake() {
    // Arrange
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);
    rig.post(SessionEvent::TransportConnected);

    // Act: four bytes of nonsense as the first frame
    rig.transport.push_input(b"\x00\x00\x00\x04XXXX");
    rig.post(SessionEvent::StreamInputReady);

    // Assert
    assert_eq!(
        rig.bus.take_client_events(),
        vec![ClientEvent::ConnectionFailed {
            message: "Protocol error from server".to_string(),
            retry: true,
        }]
    );
    assert_eq!(rig.client.state(), SessionState::Idle);
}

// ── Established-session failures ──────────────────────────────────────────────

#[test]
fn test_output_error_after_handshake_reports_disconnected() {
    let mut rig = rig();
    rig.establish();

    rig.post(SessionEvent::StreamOutputError {
        reason: "broken pipe".to_string(),
    });

    assert_eq!(rig.bus.take_client_events(), vec![ClientEvent::Disconnected]);
    assert!(!rig.client.is_connected());
    // The screen was disabled on the way down.
    assert!(rig.screen.calls().contains(&ScreenCall::Disable));
}

#[test]
fn test_peer_shutdown_variants_all_disconnect() {
    for event in [
        SessionEvent::StreamInputShutdown,
        SessionEvent::StreamOutputShutdown,
        SessionEvent::StreamDisconnected,
    ] {
        let mut rig = rig();
        rig.establish();
        rig.post(event);
        assert_eq!(rig.bus.take_client_events(), vec![ClientEvent::Disconnected]);
        assert_eq!(rig.client.state(), SessionState::Idle);
    }
}

#[test]
fn test_transport_failure_before_connection_reports_failure() {
    let mut rig = rig();
    rig.client.connect(&mut rig.bus);

    rig.post(SessionEvent::TransportConnectFailed {
        reason: "connection refused".to_string(),
    });

    assert_eq!(
        rig.bus.take_client_events(),
        vec![ClientEvent::ConnectionFailed {
            message: "connection refused".to_string(),
            retry: true,
        }]
    );
    assert!(!rig.bus.timer_armed());
    assert_eq!(rig.client.state(), SessionState::Idle);
}

// ── Invariants across the lifecycle ───────────────────────────────────────────

#[test]
fn test_timer_exists_only_while_connecting_or_awaiting_hello() {
    let mut rig = rig();
    assert!(!rig.bus.timer_armed());

    rig.client.connect(&mut rig.bus);
    assert_eq!(rig.client.state(), SessionState::Connecting);
    assert!(rig.bus.timer_armed());

    rig.post(SessionEvent::TransportConnected);
    assert_eq!(rig.client.state(), SessionState::AwaitingHello);
    assert!(rig.bus.timer_armed());

    rig.transport.push_input(HELLO_V1_6);
    rig.post(SessionEvent::StreamInputReady);
    assert_eq!(rig.client.state(), SessionState::Active);
    assert!(!rig.bus.timer_armed());
}

#[test]
fn test_proxy_exists_only_while_active() {
    let mut rig = rig();
    assert!(!rig.client.is_connected());

    rig.client.connect(&mut rig.bus);
    assert!(!rig.client.is_connected());

    rig.post(SessionEvent::TransportConnected);
    assert!(!rig.client.is_connected());

    rig.transport.push_input(HELLO_V1_6);
    rig.post(SessionEvent::StreamInputReady);
    assert!(rig.client.is_connected());
    assert_eq!(*rig.proxy.created.lock().unwrap(), 1);

    rig.client.disconnect(&mut rig.bus, None);
    assert!(!rig.client.is_connected());
}

#[test]
fn test_every_teardown_path_returns_subscriptions_to_baseline() {
    // Timeout path.
    {
        let mut rig = rig();
        let baseline = rig.bus.subscription_count();
        rig.client.connect(&mut rig.bus);
        rig.post(SessionEvent::TransportConnected);
        let deadline = rig.bus.timer_deadline().unwrap();
        rig.bus.fire_timer_if_due(deadline);
        rig.pump();
        assert_eq!(rig.bus.subscription_count(), baseline);
    }

    // Version-gate path.
    {
        let mut rig = rig();
        let baseline = rig.bus.subscription_count();
        rig.client.connect(&mut rig.bus);
        rig.post(SessionEvent::TransportConnected);
        rig.transport
            .push_input(&encode_frame(&encode_hello(ProtocolVersion::new(0, 1))).unwrap());
        rig.post(SessionEvent::StreamInputReady);
        assert_eq!(rig.bus.subscription_count(), baseline);
    }

    // Established-then-dropped path.
    let mut rig = rig();
    let baseline = rig.bus.subscription_count();
    rig.establish();
    rig.post(SessionEvent::StreamDisconnected);
    assert_eq!(rig.bus.subscription_count(), baseline);

    // Full shutdown releases even the always-on subscriptions.
    rig.client.shutdown(&mut rig.bus);
    assert_eq!(rig.bus.subscription_count(), 0);
}

// ── Pipeline composition ──────────────────────────────────────────────────────

#[test]
fn test_filter_and_crypto_layers_compose_over_the_transport() {
    const MASK: u8 = 0x5A;
    const IV: [u8; 8] = *b"edgehop!";

    // Arrange: filter below the packet layer, crypto above it
    let mut rig = rig_with(|client| {
        client
            .with_filter(Box::new(XorFilterFactory { mask: MASK }))
            .with_cipher(Box::new(XorCipherFactory::new(IV.to_vec())))
    });
    rig.client.connect(&mut rig.bus);

    // The first wire chunk is the framed IV preamble, scrambled by the
    // filter but not encrypted.
    let unscrambled: Vec<u8> = rig.transport.wire_bytes().iter().map(|b| b ^ MASK).collect();
    let mut expected = (IV.len() as u32).to_be_bytes().to_vec();
    expected.extend_from_slice(&IV);
    assert_eq!(unscrambled, expected);
    rig.transport.clear_writes();

    // Act: deliver the hello through the filter (the server is unencrypted
    // until the IV exchange completes, so only the filter applies inbound)
    rig.post(SessionEvent::TransportConnected);
    let scrambled: Vec<u8> = HELLO_V1_6.iter().map(|b| b ^ MASK).collect();
    rig.transport.push_input(&scrambled);
    rig.post(SessionEvent::StreamInputReady);

    // Assert: handshake completed and the HelloBack went out encrypted,
    // then scrambled
    assert_eq!(rig.client.state(), SessionState::Active);
    let wire: Vec<u8> = rig.transport.wire_bytes().iter().map(|b| b ^ MASK).collect();
    let payload = wire[4..].to_vec();

    let mut expected_hello_back =
        edgehop_core::protocol::encode_hello_back(ProtocolVersion::CURRENT, "myclient");
    XorCipherFactory::new(IV.to_vec())
        .create()
        .encrypt(&mut expected_hello_back);
    assert_eq!(payload, expected_hello_back);
}
