//! Length-prefixed packet framing.
//!
//! Every packet on the wire is preceded by its length as a big-endian u32.
//! [`encode_frame`] produces the prefixed bytes for one outbound packet;
//! [`FrameBuffer`] reassembles whole packets from an arbitrarily chunked
//! inbound byte stream.

use thiserror::Error;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on a single frame's payload.
///
/// Clipboard payloads can be large; anything beyond this is treated as a
/// corrupt stream rather than buffered indefinitely.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Errors that can occur while framing or reassembling packets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The payload exceeds [`MAX_FRAME_SIZE`].
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    Oversized { size: usize, limit: usize },
}

/// Prefixes `payload` with its big-endian u32 length.
///
/// # Errors
///
/// Returns [`FrameError::Oversized`] if the payload exceeds the frame limit.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::Oversized {
            size: payload.len(),
            limit: MAX_FRAME_SIZE,
        });
    }
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Incremental reassembly buffer for length-prefixed packets.
///
/// Feed raw bytes in with [`extend`](FrameBuffer::extend); pull whole packets
/// out with [`next_frame`](FrameBuffer::next_frame). Partial packets stay
/// buffered until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes received from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns `true` when at least one complete frame is buffered.
    pub fn has_frame(&self) -> bool {
        match self.peek_len() {
            Some(len) => self.buf.len() >= LENGTH_PREFIX_SIZE + len,
            None => false,
        }
    }

    /// Removes and returns the next complete frame's payload, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Oversized`] when the declared length exceeds
    /// [`MAX_FRAME_SIZE`]; the buffer is left untouched and the stream should
    /// be abandoned.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let len = match self.peek_len() {
            Some(len) => len,
            None => return Ok(None),
        };
        if len > MAX_FRAME_SIZE {
            return Err(FrameError::Oversized {
                size: len,
                limit: MAX_FRAME_SIZE,
            });
        }
        if self.buf.len() < LENGTH_PREFIX_SIZE + len {
            return Ok(None);
        }
        let payload = self.buf[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len].to_vec();
        self.buf.drain(..LENGTH_PREFIX_SIZE + len);
        Ok(Some(payload))
    }

    /// Number of raw bytes currently buffered (prefix included).
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Discards everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn peek_len(&self) -> Option<usize> {
        if self.buf.len() < LENGTH_PREFIX_SIZE {
            return None;
        }
        Some(u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_prefixes_length() {
        let framed = encode_frame(b"abc").unwrap();
        assert_eq!(framed, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_encode_frame_allows_empty_payload() {
        assert_eq!(encode_frame(b"").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_whole_frame_roundtrip() {
        // Arrange
        let mut buffer = FrameBuffer::new();
        buffer.extend(&encode_frame(b"hello").unwrap());

        // Act / Assert
        assert!(buffer.has_frame());
        assert_eq!(buffer.next_frame().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(buffer.next_frame().unwrap(), None);
        assert_eq!(buffer.buffered_len(), 0);
    }

    #[test]
    fn test_partial_frame_stays_buffered() {
        // Arrange: deliver the frame one byte short
        let framed = encode_frame(b"hello").unwrap();
        let mut buffer = FrameBuffer::new();
        buffer.extend(&framed[..framed.len() - 1]);

        // Assert: nothing comes out until the last byte arrives
        assert!(!buffer.has_frame());
        assert_eq!(buffer.next_frame().unwrap(), None);

        buffer.extend(&framed[framed.len() - 1..]);
        assert_eq!(buffer.next_frame().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_split_length_prefix() {
        let framed = encode_frame(b"xy").unwrap();
        let mut buffer = FrameBuffer::new();

        // Two bytes of the prefix, then the rest.
        buffer.extend(&framed[..2]);
        assert_eq!(buffer.next_frame().unwrap(), None);
        buffer.extend(&framed[2..]);
        assert_eq!(buffer.next_frame().unwrap(), Some(b"xy".to_vec()));
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        // Arrange: two frames delivered back to back
        let mut bytes = encode_frame(b"one").unwrap();
        bytes.extend_from_slice(&encode_frame(b"two").unwrap());
        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes);

        // Assert: both pop out in order
        assert_eq!(buffer.next_frame().unwrap(), Some(b"one".to_vec()));
        assert!(buffer.has_frame());
        assert_eq!(buffer.next_frame().unwrap(), Some(b"two".to_vec()));
        assert!(!buffer.has_frame());
    }

    #[test]
    fn test_oversized_declared_length_is_an_error() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());
        let err = buffer.next_frame().unwrap_err();
        assert!(matches!(err, FrameError::Oversized { .. }));
    }

    #[test]
    fn test_encode_frame_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(FrameError::Oversized { .. })
        ));
    }

    #[test]
    fn test_clear_discards_partial_input() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&[0, 0, 0, 9, 1, 2]);
        buffer.clear();
        assert_eq!(buffer.buffered_len(), 0);
        assert_eq!(buffer.next_frame().unwrap(), None);
    }

    #[test]
    fn test_empty_frame_roundtrip() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&encode_frame(b"").unwrap());
        assert!(buffer.has_frame());
        assert_eq!(buffer.next_frame().unwrap(), Some(Vec::new()));
    }
}
