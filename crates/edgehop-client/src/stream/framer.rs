//! The mandatory packet layer.
//!
//! Writes are prefixed with their big-endian u32 length; reads pull raw
//! chunks from the layer below into a [`FrameBuffer`] and hand out whole
//! packets only. `has_input` is true only when at least one complete packet
//! is buffered, so a partial frame never wakes the session.

use edgehop_core::frame::{encode_frame, FrameBuffer};

use super::{ResolvedEndpoint, Stream, StreamError};

pub struct PacketLayer {
    inner: Box<dyn Stream>,
    incoming: FrameBuffer,
}

impl PacketLayer {
    pub fn new(inner: Box<dyn Stream>) -> Self {
        Self {
            inner,
            incoming: FrameBuffer::new(),
        }
    }

    /// Drains every raw chunk the inner layer has buffered.
    fn pull(&mut self) -> Result<(), StreamError> {
        while let Some(chunk) = self.inner.read()? {
            self.incoming.extend(&chunk);
        }
        Ok(())
    }
}

impl Stream for PacketLayer {
    fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), StreamError> {
        self.inner.connect(endpoint)
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        let framed = encode_frame(payload)?;
        self.inner.write(&framed)
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        self.pull()?;
        Ok(self.incoming.next_frame()?)
    }

    fn has_input(&mut self) -> bool {
        let _ = self.pull();
        self.incoming.has_frame()
    }

    fn set_decrypt_iv(&mut self, iv: &[u8]) {
        self.inner.set_decrypt_iv(iv);
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::event::event_channel;
    use crate::mock::MockTransportFactory;
    use crate::stream::TransportFactory;

    fn packet_layer() -> (PacketLayer, Arc<crate::mock::TransportState>) {
        let factory = MockTransportFactory::new();
        let state = Arc::clone(&factory.state);
        let (sink, _rx) = event_channel();
        (PacketLayer::new(factory.create(sink)), state)
    }

    #[test]
    fn test_write_prefixes_length() {
        // Arrange
        let (mut layer, state) = packet_layer();

        // Act
        layer.write(b"abc").unwrap();

        // Assert: the transport saw the length prefix plus the payload
        assert_eq!(state.written(), vec![vec![0, 0, 0, 3, b'a', b'b', b'c']]);
    }

    #[test]
    fn test_read_reassembles_split_packet() {
        // Arrange: one packet delivered in three raw chunks
        let (mut layer, state) = packet_layer();
        state.push_input(&[0, 0]);
        state.push_input(&[0, 5, b'h', b'e']);

        // Act / Assert: not whole yet
        assert!(!layer.has_input());
        assert_eq!(layer.read().unwrap(), None);

        state.push_input(b"llo");
        assert!(layer.has_input());
        assert_eq!(layer.read().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_read_returns_packets_in_order() {
        let (mut layer, state) = packet_layer();
        state.push_input(&[0, 0, 0, 1, b'a', 0, 0, 0, 1, b'b']);

        assert_eq!(layer.read().unwrap(), Some(b"a".to_vec()));
        assert_eq!(layer.read().unwrap(), Some(b"b".to_vec()));
        assert_eq!(layer.read().unwrap(), None);
    }

    #[test]
    fn test_oversized_inbound_frame_is_an_error() {
        let (mut layer, state) = packet_layer();
        state.push_input(&u32::MAX.to_be_bytes());
        assert!(matches!(layer.read(), Err(StreamError::Frame(_))));
    }
}
