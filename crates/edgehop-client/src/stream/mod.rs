//! The layered stream pipeline.
//!
//! A connection is one stack of [`Stream`] layers, each owning the layer
//! below it:
//!
//! ```text
//! crypto layer (optional)     encrypts writes, decrypts reads
//! packet layer (mandatory)    length-prefixes writes, reassembles reads
//! user filter (optional)      arbitrary byte transform
//! transport (bottom)          the actual conduit, produced by a factory
//! ```
//!
//! The session talks only to the top layer and never learns which optional
//! layers are present. Dropping the top layer cascades ownership and tears
//! the whole stack down.
//!
//! Layer boundaries shift the meaning of `read`/`write`: at and above the
//! packet layer they carry whole packets, below it raw bytes. Signals
//! (connected, input ready, errors, shutdowns) do not travel through the
//! trait; transports post them through the [`EventSink`] they received from
//! their factory.

use std::net::{SocketAddr, ToSocketAddrs};

use edgehop_core::FrameError;
use thiserror::Error;

use crate::event::EventSink;

pub mod crypto;
pub mod framer;

pub use crypto::{CryptoLayer, StreamCipher, StreamCipherFactory};
pub use framer::PacketLayer;

// ── Endpoints ─────────────────────────────────────────────────────────────────

/// Where the server lives, as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEndpoint {
    /// A host name (or literal address) and port, resolved on every connect.
    Network { host: String, port: u16 },
    /// A transport-specific address the engine does not interpret
    /// (a named pipe, a serial device).
    Opaque(String),
}

impl ServerEndpoint {
    pub fn network(host: impl Into<String>, port: u16) -> Self {
        ServerEndpoint::Network {
            host: host.into(),
            port,
        }
    }

    pub fn opaque(address: impl Into<String>) -> Self {
        ServerEndpoint::Opaque(address.into())
    }

    /// Resolves the endpoint for one connect attempt.
    ///
    /// Resolution is synchronous and repeated on every attempt: addresses
    /// change under laptops moving between networks.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Resolve`] when DNS fails or yields no address.
    pub fn resolve(&self) -> Result<ResolvedEndpoint, StreamError> {
        match self {
            ServerEndpoint::Network { host, port } => {
                let mut addrs = (host.as_str(), *port)
                    .to_socket_addrs()
                    .map_err(|e| StreamError::Resolve(format!("{host}: {e}")))?;
                match addrs.next() {
                    Some(addr) => Ok(ResolvedEndpoint::Socket(addr)),
                    None => Err(StreamError::Resolve(format!("no addresses for '{host}'"))),
                }
            }
            ServerEndpoint::Opaque(address) => Ok(ResolvedEndpoint::Opaque(address.clone())),
        }
    }
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerEndpoint::Network { host, port } => write!(f, "{host}:{port}"),
            ServerEndpoint::Opaque(address) => write!(f, "{address}"),
        }
    }
}

/// An endpoint after resolution, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEndpoint {
    Socket(SocketAddr),
    Opaque(String),
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors surfaced synchronously by the stream stack.
#[derive(Debug, Error)]
pub enum StreamError {
    /// DNS failed or returned nothing usable.
    #[error("address resolution failed: {0}")]
    Resolve(String),

    /// The operation needs a connection that does not exist.
    #[error("stream is not connected")]
    NotConnected,

    /// The transport cannot handle this endpoint flavor.
    #[error("endpoint not supported by this transport: {0}")]
    UnsupportedEndpoint(String),

    /// A frame violated the packet layer's limits.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}

// ── The layer trait ───────────────────────────────────────────────────────────

/// One layer of the duplex pipeline.
pub trait Stream {
    /// Initiates the connection, cascading down to the transport.
    ///
    /// Completion is signalled later by a `TransportConnected` or
    /// `TransportConnectFailed` event. Writes issued before the connected
    /// signal are buffered by the transport and flushed once the connection
    /// is up.
    fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), StreamError>;

    /// Writes one unit (packet above the packet layer, raw bytes below).
    fn write(&mut self, payload: &[u8]) -> Result<(), StreamError>;

    /// Takes the next buffered unit, or `None` if nothing complete is
    /// available yet.
    fn read(&mut self) -> Result<Option<Vec<u8>>, StreamError>;

    /// `true` when `read` would return a unit. Above the packet layer this
    /// means a whole packet is buffered, not just bytes.
    fn has_input(&mut self) -> bool;

    /// Installs the inbound decryption IV. Cascades down; layers without a
    /// cipher pass it along, the transport ignores it.
    fn set_decrypt_iv(&mut self, iv: &[u8]);

    /// Stops the conduit. Dropping the layer also releases everything it
    /// owns; `shutdown` exists for the graceful path.
    fn shutdown(&mut self);
}

// ── Factories ─────────────────────────────────────────────────────────────────

/// Produces the bottom transport layer for each connect attempt.
///
/// The factory receives an [`EventSink`] so the transport can post its
/// signals; a fresh transport is created per attempt and destroyed with the
/// pipeline.
pub trait TransportFactory {
    fn create(&self, sink: EventSink) -> Box<dyn Stream>;
}

/// Optionally wraps the transport in a user-supplied byte filter.
///
/// The filter must preserve the transport's signal behavior; it only
/// transforms the bytes passing through.
pub trait StreamFilterFactory {
    fn create(&self, inner: Box<dyn Stream>) -> Box<dyn Stream>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
