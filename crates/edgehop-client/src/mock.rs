//! Mock collaborators for unit and integration testing.
//!
//! The real collaborators need a desktop, a network, and a cipher library.
//! The mocks replace all of that with in-memory recording: every call is
//! journalled into a `Mutex<Vec<...>>` so tests can inspect exactly what the
//! engine did and in what order, and inbound traffic is staged by pushing
//! bytes into shared state.
//!
//! These live in the library (not under `#[cfg(test)]`) so unit tests,
//! integration tests, and the diagnostic binary share one set.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use edgehop_core::{ClipboardData, ClipboardId};

use crate::event::EventSink;
use crate::proxy::{ClientTarget, ServerProxy, ServerProxyFactory};
use crate::screen::{
    ClipboardContents, GameDeviceId, KeyButton, KeyId, ModifierMask, MouseButton, Screen,
    ScreenOption, ScreenShape,
};
use crate::stream::{
    ResolvedEndpoint, Stream, StreamCipher, StreamCipherFactory, StreamError, StreamFilterFactory,
    TransportFactory,
};

// ── Mock transport ────────────────────────────────────────────────────────────

/// Shared state between a [`MockTransportFactory`], the transports it
/// creates, and the test observing them.
#[derive(Default)]
pub struct TransportState {
    /// Endpoints passed to `connect`, in order.
    pub connects: Mutex<Vec<ResolvedEndpoint>>,
    /// Every chunk written to the wire, in order.
    pub writes: Mutex<Vec<Vec<u8>>>,
    /// Staged inbound chunks, drained by `read`.
    incoming: Mutex<VecDeque<Vec<u8>>>,
    /// When set, `connect` fails synchronously with this message.
    pub fail_connect: Mutex<Option<String>>,
    /// Number of `shutdown` calls across all created transports.
    pub shutdowns: Mutex<u32>,
    /// Number of transports the factory has produced.
    pub created: Mutex<u32>,
}

impl TransportState {
    /// Stages inbound bytes for the next `read`.
    pub fn push_input(&self, bytes: &[u8]) {
        self.incoming.lock().unwrap().push_back(bytes.to_vec());
    }

    /// Snapshot of everything written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    /// Everything written so far, concatenated into one wire image.
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().concat()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }
}

/// Factory producing transports that record instead of touching a network.
#[derive(Default)]
pub struct MockTransportFactory {
    pub state: Arc<TransportState>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _sink: EventSink) -> Box<dyn Stream> {
        *self.state.created.lock().unwrap() += 1;
        Box::new(MockTransport {
            state: Arc::clone(&self.state),
        })
    }
}

struct MockTransport {
    state: Arc<TransportState>,
}

impl Stream for MockTransport {
    fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), StreamError> {
        self.state.connects.lock().unwrap().push(endpoint.clone());
        if let Some(reason) = self.state.fail_connect.lock().unwrap().clone() {
            return Err(StreamError::Transport(reason));
        }
        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        // Pre-connect writes are buffered by real transports; the mock just
        // records everything.
        self.state.writes.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        Ok(self.state.incoming.lock().unwrap().pop_front())
    }

    fn has_input(&mut self) -> bool {
        !self.state.incoming.lock().unwrap().is_empty()
    }

    fn set_decrypt_iv(&mut self, _iv: &[u8]) {}

    fn shutdown(&mut self) {
        *self.state.shutdowns.lock().unwrap() += 1;
    }
}

// ── Mock screen ───────────────────────────────────────────────────────────────

/// One recorded call on the [`MockScreen`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCall {
    Enable,
    Disable,
    Enter(ModifierMask),
    Leave,
    KeyDown(KeyId, ModifierMask, KeyButton),
    KeyRepeat(KeyId, ModifierMask, i32, KeyButton),
    KeyUp(KeyId, ModifierMask, KeyButton),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    MouseMove(i32, i32),
    MouseRelativeMove(i32, i32),
    MouseWheel(i32, i32),
    Screensaver(bool),
    ResetOptions,
    SetOptions(Vec<ScreenOption>),
    SetClipboard(ClipboardId, ClipboardData),
    GrabClipboard(ClipboardId),
    GameButtons(GameDeviceId, u16),
    GameSticks(GameDeviceId, i16, i16, i16, i16),
    GameTriggers(GameDeviceId, u8, u8),
    GameTimingReq,
}

/// A screen that records every call and serves staged clipboard contents.
#[derive(Default)]
pub struct MockScreen {
    pub calls: Mutex<Vec<ScreenCall>>,
    pub shape: Mutex<ScreenShape>,
    pub cursor: Mutex<(i32, i32)>,
    clipboards: Mutex<HashMap<ClipboardId, ClipboardContents>>,
    /// Journal of `(id, expected_time)` pairs from `read_clipboard`.
    pub clipboard_reads: Mutex<Vec<(ClipboardId, u64)>>,
}

impl MockScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages what `read_clipboard` should report for `id`.
    pub fn stage_clipboard(&self, id: ClipboardId, time: u64, data: ClipboardData) {
        self.clipboards
            .lock()
            .unwrap()
            .insert(id, ClipboardContents { time, data });
    }

    pub fn calls(&self) -> Vec<ScreenCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<ScreenCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: ScreenCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Screen for MockScreen {
    fn enable(&self) {
        self.record(ScreenCall::Enable);
    }

    fn disable(&self) {
        self.record(ScreenCall::Disable);
    }

    fn enter(&self, mask: ModifierMask) {
        self.record(ScreenCall::Enter(mask));
    }

    fn leave(&self) {
        self.record(ScreenCall::Leave);
    }

    fn shape(&self) -> ScreenShape {
        *self.shape.lock().unwrap()
    }

    fn cursor_pos(&self) -> (i32, i32) {
        *self.cursor.lock().unwrap()
    }

    fn key_down(&self, key: KeyId, mask: ModifierMask, button: KeyButton) {
        self.record(ScreenCall::KeyDown(key, mask, button));
    }

    fn key_repeat(&self, key: KeyId, mask: ModifierMask, count: i32, button: KeyButton) {
        self.record(ScreenCall::KeyRepeat(key, mask, count, button));
    }

    fn key_up(&self, key: KeyId, mask: ModifierMask, button: KeyButton) {
        self.record(ScreenCall::KeyUp(key, mask, button));
    }

    fn mouse_down(&self, button: MouseButton) {
        self.record(ScreenCall::MouseDown(button));
    }

    fn mouse_up(&self, button: MouseButton) {
        self.record(ScreenCall::MouseUp(button));
    }

    fn mouse_move(&self, x: i32, y: i32) {
        self.record(ScreenCall::MouseMove(x, y));
    }

    fn mouse_relative_move(&self, dx: i32, dy: i32) {
        self.record(ScreenCall::MouseRelativeMove(dx, dy));
    }

    fn mouse_wheel(&self, x_delta: i32, y_delta: i32) {
        self.record(ScreenCall::MouseWheel(x_delta, y_delta));
    }

    fn screensaver(&self, activate: bool) {
        self.record(ScreenCall::Screensaver(activate));
    }

    fn reset_options(&self) {
        self.record(ScreenCall::ResetOptions);
    }

    fn set_options(&self, options: &[ScreenOption]) {
        self.record(ScreenCall::SetOptions(options.to_vec()));
    }

    fn read_clipboard(&self, id: ClipboardId, expected_time: u64) -> ClipboardContents {
        self.clipboard_reads.lock().unwrap().push((id, expected_time));
        match self.clipboards.lock().unwrap().get(&id) {
            Some(contents) => {
                if expected_time != 0 && contents.time == expected_time {
                    // Unchanged since the caller last looked: skip the
                    // conversion and hand back an empty snapshot.
                    ClipboardContents {
                        time: contents.time,
                        data: ClipboardData::new(),
                    }
                } else {
                    contents.clone()
                }
            }
            None => ClipboardContents {
                time: 0,
                data: ClipboardData::new(),
            },
        }
    }

    fn set_clipboard(&self, id: ClipboardId, data: &ClipboardData) {
        self.record(ScreenCall::SetClipboard(id, data.clone()));
    }

    fn grab_clipboard(&self, id: ClipboardId) {
        self.record(ScreenCall::GrabClipboard(id));
    }

    fn game_device_buttons(&self, device: GameDeviceId, buttons: u16) {
        self.record(ScreenCall::GameButtons(device, buttons));
    }

    fn game_device_sticks(&self, device: GameDeviceId, x1: i16, y1: i16, x2: i16, y2: i16) {
        self.record(ScreenCall::GameSticks(device, x1, y1, x2, y2));
    }

    fn game_device_triggers(&self, device: GameDeviceId, t1: u8, t2: u8) {
        self.record(ScreenCall::GameTriggers(device, t1, t2));
    }

    fn game_device_timing_req(&self) {
        self.record(ScreenCall::GameTimingReq);
    }
}

// ── Scriptable server proxy ───────────────────────────────────────────────────

/// A call the scripted proxy should make on the session when it receives a
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetCall {
    Enter { x: i32, y: i32, seq_num: u32, mask: ModifierMask },
    Leave,
    SetClipboard(ClipboardId, ClipboardData),
    GrabClipboard(ClipboardId),
    SetClipboardDirty(ClipboardId, bool),
    KeyDown(KeyId, ModifierMask, KeyButton),
    KeyRepeat(KeyId, ModifierMask, i32, KeyButton),
    KeyUp(KeyId, ModifierMask, KeyButton),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    MouseMove(i32, i32),
    MouseRelativeMove(i32, i32),
    MouseWheel(i32, i32),
    Screensaver(bool),
    ResetOptions,
    SetOptions(Vec<ScreenOption>),
    GameButtons(GameDeviceId, u16),
    GameSticks(GameDeviceId, i16, i16, i16, i16),
    GameTriggers(GameDeviceId, u8, u8),
    GameTimingReq,
}

/// One recorded outbound call on the scripted proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyCall {
    HandleFrame(Vec<u8>),
    GrabClipboard(ClipboardId),
    ClipboardChanged(ClipboardId, ClipboardData),
    InfoChanged(ScreenShape, (i32, i32)),
    GameTimingResp(u16),
    GameFeedback(GameDeviceId, u16, u16),
}

/// Shared state between a [`ScriptProxyFactory`], its proxies, and the test.
#[derive(Default)]
pub struct ProxyState {
    /// Outbound calls the session made, in order.
    pub calls: Mutex<Vec<ProxyCall>>,
    /// Per-frame script: each inbound frame pops one call to replay onto the
    /// session.
    pub script: Mutex<VecDeque<TargetCall>>,
    /// Number of proxies created (one per established session).
    pub created: Mutex<u32>,
}

impl ProxyState {
    /// Queues a target call for the next inbound frame.
    pub fn push_script(&self, call: TargetCall) {
        self.script.lock().unwrap().push_back(call);
    }

    pub fn calls(&self) -> Vec<ProxyCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<ProxyCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

/// Factory producing proxies that journal outbound calls and replay a
/// scripted call per inbound frame.
#[derive(Default)]
pub struct ScriptProxyFactory {
    pub state: Arc<ProxyState>,
}

impl ScriptProxyFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServerProxyFactory for ScriptProxyFactory {
    fn create(&self) -> Box<dyn ServerProxy> {
        *self.state.created.lock().unwrap() += 1;
        Box::new(ScriptProxy {
            state: Arc::clone(&self.state),
        })
    }
}

struct ScriptProxy {
    state: Arc<ProxyState>,
}

impl ServerProxy for ScriptProxy {
    fn handle_frame(
        &mut self,
        frame: &[u8],
        _stream: &mut dyn Stream,
        target: &mut dyn ClientTarget,
    ) {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(ProxyCall::HandleFrame(frame.to_vec()));
        let next = self.state.script.lock().unwrap().pop_front();
        if let Some(call) = next {
            apply(call, target);
        }
    }

    fn grab_clipboard(&mut self, id: ClipboardId, _stream: &mut dyn Stream) {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(ProxyCall::GrabClipboard(id));
    }

    fn clipboard_changed(&mut self, id: ClipboardId, data: &ClipboardData, _stream: &mut dyn Stream) {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(ProxyCall::ClipboardChanged(id, data.clone()));
    }

    fn info_changed(&mut self, shape: ScreenShape, cursor: (i32, i32), _stream: &mut dyn Stream) {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(ProxyCall::InfoChanged(shape, cursor));
    }

    fn game_device_timing_resp(&mut self, freq: u16, _stream: &mut dyn Stream) {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(ProxyCall::GameTimingResp(freq));
    }

    fn game_device_feedback(
        &mut self,
        device: GameDeviceId,
        motor1: u16,
        motor2: u16,
        _stream: &mut dyn Stream,
    ) {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(ProxyCall::GameFeedback(device, motor1, motor2));
    }
}

fn apply(call: TargetCall, target: &mut dyn ClientTarget) {
    match call {
        TargetCall::Enter { x, y, seq_num, mask } => target.enter(x, y, seq_num, mask, false),
        TargetCall::Leave => target.leave(),
        TargetCall::SetClipboard(id, data) => target.set_clipboard(id, &data),
        TargetCall::GrabClipboard(id) => target.grab_clipboard(id),
        TargetCall::SetClipboardDirty(id, dirty) => target.set_clipboard_dirty(id, dirty),
        TargetCall::KeyDown(key, mask, button) => target.key_down(key, mask, button),
        TargetCall::KeyRepeat(key, mask, count, button) => {
            target.key_repeat(key, mask, count, button)
        }
        TargetCall::KeyUp(key, mask, button) => target.key_up(key, mask, button),
        TargetCall::MouseDown(button) => target.mouse_down(button),
        TargetCall::MouseUp(button) => target.mouse_up(button),
        TargetCall::MouseMove(x, y) => target.mouse_move(x, y),
        TargetCall::MouseRelativeMove(dx, dy) => target.mouse_relative_move(dx, dy),
        TargetCall::MouseWheel(x, y) => target.mouse_wheel(x, y),
        TargetCall::Screensaver(activate) => target.screensaver(activate),
        TargetCall::ResetOptions => target.reset_options(),
        TargetCall::SetOptions(options) => target.set_options(&options),
        TargetCall::GameButtons(device, buttons) => target.game_device_buttons(device, buttons),
        TargetCall::GameSticks(device, x1, y1, x2, y2) => {
            target.game_device_sticks(device, x1, y1, x2, y2)
        }
        TargetCall::GameTriggers(device, t1, t2) => target.game_device_triggers(device, t1, t2),
        TargetCall::GameTimingReq => target.game_device_timing_req(),
    }
}

// ── Xor cipher ────────────────────────────────────────────────────────────────

/// A stand-in cipher: xors each byte with a key derived from the IV.
///
/// Obviously not cryptography; it exists so tests can verify the crypto
/// layer's plumbing (preamble, direction gating, cascade).
pub struct XorCipher {
    encrypt_iv: Vec<u8>,
    encrypt_key: u8,
    decrypt_key: Option<u8>,
}

fn derive_key(iv: &[u8]) -> u8 {
    iv.iter().fold(0x5Au8, |acc, b| acc ^ b)
}

impl StreamCipher for XorCipher {
    fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.encrypt_key;
        }
    }

    fn decrypt(&mut self, data: &mut [u8]) {
        if let Some(key) = self.decrypt_key {
            for byte in data {
                *byte ^= key;
            }
        }
    }

    fn set_decrypt_iv(&mut self, iv: &[u8]) {
        self.decrypt_key = Some(derive_key(iv));
    }

    fn encrypt_iv(&self) -> &[u8] {
        &self.encrypt_iv
    }
}

pub struct XorCipherFactory {
    iv: Vec<u8>,
}

impl XorCipherFactory {
    pub fn new(iv: Vec<u8>) -> Self {
        Self { iv }
    }
}

impl StreamCipherFactory for XorCipherFactory {
    fn create(&self) -> Box<dyn StreamCipher> {
        Box::new(XorCipher {
            encrypt_key: derive_key(&self.iv),
            encrypt_iv: self.iv.clone(),
            decrypt_key: None,
        })
    }
}

// ── Xor stream filter ─────────────────────────────────────────────────────────

/// A user filter that xors every byte both ways.
///
/// Proves the filter slot sits between the transport and the packet layer:
/// with it installed, the wire image is scrambled but packets above it are
/// untouched.
pub struct XorFilterFactory {
    pub mask: u8,
}

impl StreamFilterFactory for XorFilterFactory {
    fn create(&self, inner: Box<dyn Stream>) -> Box<dyn Stream> {
        Box::new(XorFilter {
            inner,
            mask: self.mask,
        })
    }
}

struct XorFilter {
    inner: Box<dyn Stream>,
    mask: u8,
}

impl Stream for XorFilter {
    fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), StreamError> {
        self.inner.connect(endpoint)
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        let scrambled: Vec<u8> = payload.iter().map(|b| b ^ self.mask).collect();
        self.inner.write(&scrambled)
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        Ok(self
            .inner
            .read()?
            .map(|chunk| chunk.iter().map(|b| b ^ self.mask).collect()))
    }

    fn has_input(&mut self) -> bool {
        self.inner.has_input()
    }

    fn set_decrypt_iv(&mut self, iv: &[u8]) {
        self.inner.set_decrypt_iv(iv);
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
    }
}
