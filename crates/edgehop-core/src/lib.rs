//! # edgehop-core
//!
//! Shared library for edgehop containing the handshake wire codec, the
//! length-prefixed packet framing buffer, and the clipboard domain logic
//! (payload marshalling and per-slot ownership tracking).
//!
//! This crate is consumed by the session engine in `edgehop-client`.  It has
//! zero dependencies on OS APIs, sockets, or async runtimes, so everything in
//! it can be unit tested byte for byte.

pub mod clipboard;
pub mod frame;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `edgehop_core::ProtocolVersion` instead of the full module path.
pub use clipboard::{ClipboardData, ClipboardError, ClipboardFormat, ClipboardId, ClipboardLedger};
pub use frame::{FrameBuffer, FrameError};
pub use protocol::{ProtocolError, ProtocolVersion};
