//! The server proxy collaborator.
//!
//! Once the handshake completes, the session hands every inbound packet to a
//! [`ServerProxy`] and stops interpreting the wire itself. The proxy parses
//! the server's messages and calls back into the session through the
//! [`ClientTarget`] trait; outbound notifications (clipboard contents, screen
//! geometry, game-device reports) go out through the proxy as well, so the
//! message encoding lives in exactly one collaborator.
//!
//! The session owns the proxy; the proxy never owns the session or the
//! stream. Both are lent to it per call, which keeps teardown a plain drop
//! in owner order.

use edgehop_core::{ClipboardData, ClipboardId};
use tracing::debug;

use crate::screen::{
    GameDeviceId, KeyButton, KeyId, ModifierMask, MouseButton, ScreenOption, ScreenShape,
};
use crate::stream::Stream;

/// The session as seen by the server proxy: one method per server-initiated
/// operation.
pub trait ClientTarget {
    /// The server's cursor entered this screen at `(x, y)`.
    fn enter(&mut self, x: i32, y: i32, seq_num: u32, mask: ModifierMask, for_screensaver: bool);

    /// The server's cursor left; locally owned clipboards flush now.
    fn leave(&mut self);

    fn set_clipboard(&mut self, id: ClipboardId, data: &ClipboardData);

    fn grab_clipboard(&mut self, id: ClipboardId);

    /// Exists for interface symmetry with the server side; a server must
    /// never invoke it on a client. Calling it is a contract violation and
    /// panics.
    fn set_clipboard_dirty(&mut self, id: ClipboardId, dirty: bool);

    fn key_down(&mut self, key: KeyId, mask: ModifierMask, button: KeyButton);

    fn key_repeat(&mut self, key: KeyId, mask: ModifierMask, count: i32, button: KeyButton);

    fn key_up(&mut self, key: KeyId, mask: ModifierMask, button: KeyButton);

    fn mouse_down(&mut self, button: MouseButton);

    fn mouse_up(&mut self, button: MouseButton);

    fn mouse_move(&mut self, x: i32, y: i32);

    fn mouse_relative_move(&mut self, dx: i32, dy: i32);

    fn mouse_wheel(&mut self, x_delta: i32, y_delta: i32);

    fn screensaver(&mut self, activate: bool);

    fn reset_options(&mut self);

    fn set_options(&mut self, options: &[ScreenOption]);

    fn game_device_buttons(&mut self, device: GameDeviceId, buttons: u16);

    fn game_device_sticks(&mut self, device: GameDeviceId, x1: i16, y1: i16, x2: i16, y2: i16);

    fn game_device_triggers(&mut self, device: GameDeviceId, t1: u8, t2: u8);

    fn game_device_timing_req(&mut self);
}

/// Parses server messages and encodes client notifications.
pub trait ServerProxy {
    /// Handles one inbound packet, calling into `target` as needed and
    /// writing any replies to `stream`.
    fn handle_frame(&mut self, frame: &[u8], stream: &mut dyn Stream, target: &mut dyn ClientTarget);

    /// Announces that the local screen now owns clipboard `id`.
    fn grab_clipboard(&mut self, id: ClipboardId, stream: &mut dyn Stream);

    /// Transmits clipboard contents. Always preceded by the matching
    /// [`grab_clipboard`](Self::grab_clipboard) announcement.
    fn clipboard_changed(&mut self, id: ClipboardId, data: &ClipboardData, stream: &mut dyn Stream);

    /// Reports the local screen's geometry and cursor position.
    fn info_changed(&mut self, shape: ScreenShape, cursor: (i32, i32), stream: &mut dyn Stream);

    /// Forwards the screen's answer to a game-device timing request.
    fn game_device_timing_resp(&mut self, freq: u16, stream: &mut dyn Stream);

    /// Forwards game-device haptic feedback state.
    fn game_device_feedback(
        &mut self,
        device: GameDeviceId,
        motor1: u16,
        motor2: u16,
        stream: &mut dyn Stream,
    );
}

/// Produces a fresh proxy when a session reaches the active state.
pub trait ServerProxyFactory {
    fn create(&self) -> Box<dyn ServerProxy>;
}

// ── Diagnostic proxy ──────────────────────────────────────────────────────────

/// A proxy that decodes nothing: it logs the four-byte tag of every inbound
/// packet and drops outbound notifications on the floor.
///
/// Useful as a protocol probe; the binary uses it to verify connectivity and
/// handshake against a real server without driving a screen.
pub struct FrameLogProxy;

fn frame_tag(frame: &[u8]) -> String {
    frame
        .iter()
        .take(4)
        .map(|&b| {
            if b.is_ascii_graphic() {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

impl ServerProxy for FrameLogProxy {
    fn handle_frame(
        &mut self,
        frame: &[u8],
        _stream: &mut dyn Stream,
        _target: &mut dyn ClientTarget,
    ) {
        debug!("server message {} ({} bytes)", frame_tag(frame), frame.len());
    }

    fn grab_clipboard(&mut self, id: ClipboardId, _stream: &mut dyn Stream) {
        debug!("would announce ownership of {id}");
    }

    fn clipboard_changed(&mut self, id: ClipboardId, data: &ClipboardData, _stream: &mut dyn Stream) {
        debug!("would send {id} contents ({} bytes)", data.marshal().len());
    }

    fn info_changed(&mut self, shape: ScreenShape, cursor: (i32, i32), _stream: &mut dyn Stream) {
        debug!("would report shape {shape:?}, cursor {cursor:?}");
    }

    fn game_device_timing_resp(&mut self, freq: u16, _stream: &mut dyn Stream) {
        debug!("would report game-device timing {freq}");
    }

    fn game_device_feedback(
        &mut self,
        device: GameDeviceId,
        motor1: u16,
        motor2: u16,
        _stream: &mut dyn Stream,
    ) {
        debug!("would report game-device {device} feedback {motor1}/{motor2}");
    }
}

pub struct FrameLogProxyFactory;

impl ServerProxyFactory for FrameLogProxyFactory {
    fn create(&self) -> Box<dyn ServerProxy> {
        Box::new(FrameLogProxy)
    }
}
