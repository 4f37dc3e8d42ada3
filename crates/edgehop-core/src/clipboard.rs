//! Clipboard domain logic: slot identifiers, the marshalled payload format,
//! and the per-slot ownership ledger.
//!
//! The client tracks a small fixed set of clipboards (the common clipboard
//! and the X11-style selection). For each slot the ledger remembers whether
//! the local screen owns it, the timestamp of the contents it last saw, and
//! the exact bytes it last transmitted, so identical contents are never sent
//! to the server twice.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Identifiers and formats ───────────────────────────────────────────────────

/// Number of tracked clipboard slots.
pub const CLIPBOARD_COUNT: usize = 2;

/// One of the fixed clipboard slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClipboardId {
    /// The ordinary copy/paste clipboard.
    Clipboard = 0,
    /// The primary selection (middle-click paste on X11).
    Selection = 1,
}

impl ClipboardId {
    /// All slots, in wire order.
    pub const ALL: [ClipboardId; CLIPBOARD_COUNT] = [ClipboardId::Clipboard, ClipboardId::Selection];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for ClipboardId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(ClipboardId::Clipboard),
            1 => Ok(ClipboardId::Selection),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ClipboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardId::Clipboard => write!(f, "clipboard"),
            ClipboardId::Selection => write!(f, "selection"),
        }
    }
}

/// Data format of one clipboard item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClipboardFormat {
    Text = 0x01,
    Html = 0x02,
    Bitmap = 0x03,
}

impl TryFrom<u8> for ClipboardFormat {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(ClipboardFormat::Text),
            0x02 => Ok(ClipboardFormat::Html),
            0x03 => Ok(ClipboardFormat::Bitmap),
            _ => Err(()),
        }
    }
}

/// Errors that can occur while unmarshalling a clipboard payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("truncated clipboard payload: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown clipboard format: 0x{0:02X}")]
    UnknownFormat(u8),
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// The contents of one clipboard: an ordered list of `(format, bytes)` items.
///
/// Marshalled layout (all integers big-endian):
///
/// ```text
/// [count:u32] then per item: [format:u8] [len:u32] [bytes]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClipboardData {
    items: Vec<(ClipboardFormat, Vec<u8>)>,
}

impl ClipboardData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a text-only clipboard.
    pub fn from_text(text: &str) -> Self {
        let mut data = Self::new();
        data.add(ClipboardFormat::Text, text.as_bytes().to_vec());
        data
    }

    /// Adds or replaces the item for `format`.
    pub fn add(&mut self, format: ClipboardFormat, bytes: Vec<u8>) {
        if let Some(item) = self.items.iter_mut().find(|(f, _)| *f == format) {
            item.1 = bytes;
        } else {
            self.items.push((format, bytes));
        }
    }

    /// Returns the bytes stored for `format`, if any.
    pub fn get(&self, format: ClipboardFormat) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, b)| b.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serializes the contents to the wire layout.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.items.len() as u32).to_be_bytes());
        for (format, bytes) in &self.items {
            buf.push(*format as u8);
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
        buf
    }

    /// Parses the wire layout back into contents.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError`] on truncation or an unknown format byte.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, ClipboardError> {
        let count = read_u32(bytes, 0)? as usize;
        let mut items = Vec::with_capacity(count);
        let mut offset = 4;
        for _ in 0..count {
            if bytes.len() < offset + 1 {
                return Err(ClipboardError::Truncated {
                    needed: offset + 1,
                    available: bytes.len(),
                });
            }
            let format = ClipboardFormat::try_from(bytes[offset])
                .map_err(|_| ClipboardError::UnknownFormat(bytes[offset]))?;
            offset += 1;
            let len = read_u32(bytes, offset)? as usize;
            offset += 4;
            if bytes.len() < offset + len {
                return Err(ClipboardError::Truncated {
                    needed: offset + len,
                    available: bytes.len(),
                });
            }
            items.push((format, bytes[offset..offset + len].to_vec()));
            offset += len;
        }
        Ok(Self { items })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, ClipboardError> {
    if bytes.len() < offset + 4 {
        return Err(ClipboardError::Truncated {
            needed: offset + 4,
            available: bytes.len(),
        });
    }
    Ok(u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]))
}

// ── Ledger ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct Slot {
    owned: bool,
    sent: bool,
    /// Screen timestamp of the contents last seen; 0 means never looked.
    last_seen: u64,
    /// Marshalled bytes last transmitted to the server.
    last_sent: Option<Vec<u8>>,
}

/// Per-slot clipboard state: ownership, change detection, duplicate
/// suppression.
///
/// The ledger is pure bookkeeping; reading the screen and talking to the
/// server stay with the caller.
#[derive(Debug, Default)]
pub struct ClipboardLedger {
    slots: [Slot; CLIPBOARD_COUNT],
}

impl ClipboardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The local screen grabbed the clipboard: we own it, nothing sent yet,
    /// and the timestamp is forgotten so the next flush re-reads it.
    pub fn local_grab(&mut self, id: ClipboardId) {
        let slot = &mut self.slots[id.index()];
        slot.owned = true;
        slot.sent = false;
        slot.last_seen = 0;
        slot.last_sent = None;
    }

    /// The server wrote the clipboard: ownership moves to the remote.
    pub fn remote_set(&mut self, id: ClipboardId) {
        let slot = &mut self.slots[id.index()];
        slot.owned = false;
        slot.sent = false;
    }

    /// The server grabbed the clipboard without contents.
    pub fn remote_grab(&mut self, id: ClipboardId) {
        // Same bookkeeping as a remote write.
        self.remote_set(id);
    }

    /// Clears every slot. Called when a fresh connection is established.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
    }

    pub fn owned(&self, id: ClipboardId) -> bool {
        self.slots[id.index()].owned
    }

    pub fn sent(&self, id: ClipboardId) -> bool {
        self.slots[id.index()].sent
    }

    /// Timestamp to hand the screen when opening the clipboard, letting it
    /// skip content conversion if nothing changed.
    pub fn last_seen(&self, id: ClipboardId) -> u64 {
        self.slots[id.index()].last_seen
    }

    pub fn last_sent(&self, id: ClipboardId) -> Option<&[u8]> {
        self.slots[id.index()].last_sent.as_deref()
    }

    /// Returns `true` when the screen's reported timestamp warrants
    /// marshalling the contents at all: either we never looked, or the
    /// timestamp moved.
    pub fn needs_marshal(&self, id: ClipboardId, time: u64) -> bool {
        let slot = &self.slots[id.index()];
        slot.last_seen == 0 || time != slot.last_seen
    }

    /// Records freshly marshalled contents and decides whether to transmit.
    ///
    /// Call only after [`needs_marshal`](Self::needs_marshal) returned `true`.
    /// The timestamp is always recorded; the bytes are transmitted (and
    /// remembered) only if nothing was sent yet or they differ from the last
    /// transmission.
    pub fn commit(&mut self, id: ClipboardId, time: u64, marshalled: &[u8]) -> bool {
        let slot = &mut self.slots[id.index()];
        slot.last_seen = time;
        let changed = match &slot.last_sent {
            Some(previous) => previous.as_slice() != marshalled,
            None => true,
        };
        if !slot.sent || changed {
            slot.sent = true;
            slot.last_sent = Some(marshalled.to_vec());
            return true;
        }
        false
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Payload marshalling ───────────────────────────────────────────────────

    #[test]
    fn test_marshal_roundtrip_preserves_items() {
        // Arrange
        let mut data = ClipboardData::from_text("hello");
        data.add(ClipboardFormat::Html, b"<b>hello</b>".to_vec());

        // Act
        let bytes = data.marshal();
        let decoded = ClipboardData::unmarshal(&bytes).unwrap();

        // Assert
        assert_eq!(decoded, data);
        assert_eq!(decoded.get(ClipboardFormat::Text), Some(&b"hello"[..]));
    }

    #[test]
    fn test_marshal_roundtrip_empty() {
        let data = ClipboardData::new();
        let decoded = ClipboardData::unmarshal(&data.marshal()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_marshal_is_deterministic_for_equal_contents() {
        let a = ClipboardData::from_text("same");
        let b = ClipboardData::from_text("same");
        assert_eq!(a.marshal(), b.marshal());
    }

    #[test]
    fn test_add_replaces_existing_format() {
        let mut data = ClipboardData::from_text("old");
        data.add(ClipboardFormat::Text, b"new".to_vec());
        assert_eq!(data.get(ClipboardFormat::Text), Some(&b"new"[..]));
        assert_eq!(data.marshal(), ClipboardData::from_text("new").marshal());
    }

    #[test]
    fn test_unmarshal_rejects_truncated_payload() {
        let mut bytes = ClipboardData::from_text("hello").marshal();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            ClipboardData::unmarshal(&bytes),
            Err(ClipboardError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unmarshal_rejects_unknown_format() {
        // One item with format byte 0x7F.
        let mut bytes = 1u32.to_be_bytes().to_vec();
        bytes.push(0x7F);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(
            ClipboardData::unmarshal(&bytes),
            Err(ClipboardError::UnknownFormat(0x7F))
        );
    }

    // ── Ledger transitions ────────────────────────────────────────────────────

    #[test]
    fn test_local_grab_resets_slot() {
        // Arrange: a slot with history
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);
        ledger.commit(ClipboardId::Clipboard, 10, b"payload");

        // Act
        ledger.local_grab(ClipboardId::Clipboard);

        // Assert
        assert!(ledger.owned(ClipboardId::Clipboard));
        assert!(!ledger.sent(ClipboardId::Clipboard));
        assert_eq!(ledger.last_seen(ClipboardId::Clipboard), 0);
        assert_eq!(ledger.last_sent(ClipboardId::Clipboard), None);
    }

    #[test]
    fn test_remote_set_clears_ownership_and_sent() {
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Selection);
        ledger.commit(ClipboardId::Selection, 5, b"x");

        ledger.remote_set(ClipboardId::Selection);

        assert!(!ledger.owned(ClipboardId::Selection));
        assert!(!ledger.sent(ClipboardId::Selection));
    }

    #[test]
    fn test_remote_grab_clears_ownership_and_sent() {
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);

        ledger.remote_grab(ClipboardId::Clipboard);

        assert!(!ledger.owned(ClipboardId::Clipboard));
        assert!(!ledger.sent(ClipboardId::Clipboard));
    }

    #[test]
    fn test_reset_clears_all_slots() {
        let mut ledger = ClipboardLedger::new();
        for id in ClipboardId::ALL {
            ledger.local_grab(id);
            ledger.commit(id, 3, b"data");
        }

        ledger.reset();

        for id in ClipboardId::ALL {
            assert!(!ledger.owned(id));
            assert!(!ledger.sent(id));
            assert_eq!(ledger.last_seen(id), 0);
        }
    }

    // ── Change detection ──────────────────────────────────────────────────────

    #[test]
    fn test_needs_marshal_when_never_seen() {
        let ledger = ClipboardLedger::new();
        assert!(ledger.needs_marshal(ClipboardId::Clipboard, 42));
    }

    #[test]
    fn test_needs_marshal_false_when_timestamp_unchanged() {
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);
        ledger.commit(ClipboardId::Clipboard, 42, b"data");

        assert!(!ledger.needs_marshal(ClipboardId::Clipboard, 42));
        assert!(ledger.needs_marshal(ClipboardId::Clipboard, 43));
    }

    #[test]
    fn test_first_commit_transmits() {
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);

        assert!(ledger.commit(ClipboardId::Clipboard, 7, b"bytes"));
        assert!(ledger.sent(ClipboardId::Clipboard));
        assert_eq!(ledger.last_sent(ClipboardId::Clipboard), Some(&b"bytes"[..]));
    }

    #[test]
    fn test_commit_suppresses_identical_bytes() {
        // Arrange: contents already sent once
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);
        assert!(ledger.commit(ClipboardId::Clipboard, 7, b"bytes"));

        // Act: timestamp moved but bytes did not
        let again = ledger.commit(ClipboardId::Clipboard, 8, b"bytes");

        // Assert: no retransmission, timestamp still updated
        assert!(!again);
        assert_eq!(ledger.last_seen(ClipboardId::Clipboard), 8);
    }

    #[test]
    fn test_commit_transmits_changed_bytes() {
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);
        ledger.commit(ClipboardId::Clipboard, 7, b"old");

        assert!(ledger.commit(ClipboardId::Clipboard, 9, b"new"));
        assert_eq!(ledger.last_sent(ClipboardId::Clipboard), Some(&b"new"[..]));
    }

    #[test]
    fn test_sent_implies_payload_recorded() {
        let mut ledger = ClipboardLedger::new();
        for id in ClipboardId::ALL {
            ledger.local_grab(id);
            ledger.commit(id, 1, &ClipboardData::new().marshal());
            if ledger.sent(id) {
                assert!(ledger.last_sent(id).is_some());
            }
        }
    }

    #[test]
    fn test_slots_are_independent() {
        let mut ledger = ClipboardLedger::new();
        ledger.local_grab(ClipboardId::Clipboard);

        assert!(ledger.owned(ClipboardId::Clipboard));
        assert!(!ledger.owned(ClipboardId::Selection));
    }
}
