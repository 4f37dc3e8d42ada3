//! The platform screen collaborator.
//!
//! The screen is the engine's window onto the local machine: it injects
//! input events, owns the system clipboard, and reports geometry. Platform
//! implementations (SendInput on Windows, XTest on X11, CoreGraphics on
//! macOS) live outside this crate; the engine only sees this trait.
//!
//! Screen-originated notifications do not come back through the trait. The
//! platform adapter posts them as bus events: `ScreenSuspend`,
//! `ScreenResume`, `ScreenShapeChanged`, `ClipboardGrabbed`,
//! `GameDeviceTimingResp`, and `GameDeviceFeedback`.

use edgehop_core::{ClipboardData, ClipboardId};
use serde::{Deserialize, Serialize};

/// Platform-independent key symbol.
pub type KeyId = u32;

/// Physical key (scan) code.
pub type KeyButton = u16;

/// Bitmask of held modifier keys.
pub type ModifierMask = u16;

/// Mouse button index; 1 is the left button.
pub type MouseButton = u8;

/// Index of a game controller device.
pub type GameDeviceId = u16;

/// The screen's bounding rectangle in virtual desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenShape {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One screen option as carried by the protocol (id, value) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenOption {
    pub id: u32,
    pub value: i32,
}

/// A clipboard snapshot read from the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardContents {
    /// The screen's timestamp for these contents; monotonic, 0 means unset.
    pub time: u64,
    pub data: ClipboardData,
}

/// The platform screen driver.
///
/// Methods take `&self`; implementations use interior mutability where they
/// record or queue. All calls arrive on the driver thread.
pub trait Screen {
    /// Starts delivering remote input to the platform.
    fn enable(&self);

    /// Stops delivering remote input.
    fn disable(&self);

    /// The server's cursor entered this screen with the given modifiers held.
    fn enter(&self, mask: ModifierMask);

    /// The server's cursor left this screen.
    fn leave(&self);

    fn shape(&self) -> ScreenShape;

    fn cursor_pos(&self) -> (i32, i32);

    fn key_down(&self, key: KeyId, mask: ModifierMask, button: KeyButton);

    /// Auto-repeat: `count` repeats collapsed into one call.
    fn key_repeat(&self, key: KeyId, mask: ModifierMask, count: i32, button: KeyButton);

    fn key_up(&self, key: KeyId, mask: ModifierMask, button: KeyButton);

    fn mouse_down(&self, button: MouseButton);

    fn mouse_up(&self, button: MouseButton);

    /// Moves the cursor to an absolute position.
    fn mouse_move(&self, x: i32, y: i32);

    /// Moves the cursor by a delta (relative-motion mode).
    fn mouse_relative_move(&self, dx: i32, dy: i32);

    /// Wheel rotation; horizontal and vertical deltas are independent.
    fn mouse_wheel(&self, x_delta: i32, y_delta: i32);

    fn screensaver(&self, activate: bool);

    fn reset_options(&self);

    fn set_options(&self, options: &[ScreenOption]);

    /// Reads a clipboard, announcing the timestamp of the contents last seen.
    ///
    /// When `expected_time` is nonzero and matches the clipboard's current
    /// timestamp, the implementation may skip content conversion and return
    /// empty data with the unchanged timestamp; the caller only inspects the
    /// data when the timestamp differs or was never seen.
    fn read_clipboard(&self, id: ClipboardId, expected_time: u64) -> ClipboardContents;

    /// Writes the given contents to a clipboard.
    fn set_clipboard(&self, id: ClipboardId, data: &ClipboardData);

    /// Takes ownership of a clipboard without setting contents.
    fn grab_clipboard(&self, id: ClipboardId);

    fn game_device_buttons(&self, device: GameDeviceId, buttons: u16);

    fn game_device_sticks(&self, device: GameDeviceId, x1: i16, y1: i16, x2: i16, y2: i16);

    fn game_device_triggers(&self, device: GameDeviceId, t1: u8, t2: u8);

    /// Asks the screen to measure game-device timing; the answer comes back
    /// as a `GameDeviceTimingResp` bus event.
    fn game_device_timing_req(&self);
}
