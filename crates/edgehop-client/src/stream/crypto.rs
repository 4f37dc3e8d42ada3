//! The optional encryption layer.
//!
//! Wraps the packet layer with a symmetric stream cipher behind the
//! [`StreamCipher`] seam; the actual primitives live outside this crate.
//!
//! IV handling is asymmetric by design. The outbound IV is chosen locally
//! and sent in the clear as the very first packet after the transport
//! connects, before any handshake traffic; every write after that is
//! encrypted. The inbound IV is learned later: the server proxy parses it
//! out of the message flow and installs it via `set_decrypt_iv`, so reads
//! pass through untouched until then.

use super::{ResolvedEndpoint, Stream, StreamError};

/// Symmetric stream cipher seam.
///
/// Implementations keep separate encrypt and decrypt cipher states; both
/// advance with the bytes they process.
pub trait StreamCipher {
    fn encrypt(&mut self, data: &mut [u8]);

    fn decrypt(&mut self, data: &mut [u8]);

    /// Installs the peer's IV for the decrypt direction.
    fn set_decrypt_iv(&mut self, iv: &[u8]);

    /// The locally chosen IV for the encrypt direction, transmitted to the
    /// peer in the clear.
    fn encrypt_iv(&self) -> &[u8];
}

/// Produces a fresh cipher per connection.
pub trait StreamCipherFactory {
    fn create(&self) -> Box<dyn StreamCipher>;
}

pub struct CryptoLayer {
    inner: Box<dyn Stream>,
    cipher: Box<dyn StreamCipher>,
    decrypt_ready: bool,
}

impl CryptoLayer {
    pub fn new(inner: Box<dyn Stream>, cipher: Box<dyn StreamCipher>) -> Self {
        Self {
            inner,
            cipher,
            decrypt_ready: false,
        }
    }
}

impl Stream for CryptoLayer {
    fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), StreamError> {
        self.inner.connect(endpoint)?;
        // The IV preamble travels as a clear packet ahead of everything
        // else; the transport buffers it until the connection is up.
        let iv = self.cipher.encrypt_iv().to_vec();
        self.inner.write(&iv)
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        let mut buf = payload.to_vec();
        self.cipher.encrypt(&mut buf);
        self.inner.write(&buf)
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        match self.inner.read()? {
            Some(mut packet) => {
                if self.decrypt_ready {
                    self.cipher.decrypt(&mut packet);
                }
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    fn has_input(&mut self) -> bool {
        self.inner.has_input()
    }

    fn set_decrypt_iv(&mut self, iv: &[u8]) {
        self.cipher.set_decrypt_iv(iv);
        self.decrypt_ready = true;
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
