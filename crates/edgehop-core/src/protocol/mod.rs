//! Handshake wire protocol.
//!
//! The only messages the session engine reads and writes itself are the two
//! handshake messages exchanged when a connection is established:
//!
//! 1. `Hello` (server to client): the protocol tag followed by the server's
//!    version.
//! 2. `HelloBack` (client to server): the tag, the client's version, and the
//!    client's name.
//!
//! Everything after the handshake belongs to the server proxy collaborator
//! and never passes through this module.

pub mod handshake;

pub use handshake::{
    decode_hello, decode_hello_back, encode_hello, encode_hello_back, ProtocolError,
    ProtocolVersion, PROTOCOL_TAG,
};
