//! Binary codec for the `Hello` / `HelloBack` handshake messages.
//!
//! Wire format (inside an already de-framed packet, all integers big-endian):
//!
//! ```text
//! Hello:     "Synergy" [major:i16] [minor:i16]
//! HelloBack: "Synergy" [major:i16] [minor:i16] [name_len:u32] [name:UTF-8]
//! ```
//!
//! The tag is the literal 7 ASCII bytes `Synergy`; the protocol is
//! wire-compatible with servers speaking that dialect.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Seven-byte ASCII tag opening both handshake messages.
pub const PROTOCOL_TAG: &[u8; 7] = b"Synergy";

/// Protocol version compiled into this client.
pub const PROTOCOL_MAJOR: i16 = 1;
pub const PROTOCOL_MINOR: i16 = 6;

/// Errors that can occur while decoding a handshake message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message does not open with the protocol tag.
    #[error("unrecognized handshake tag")]
    BadTag,

    /// The message carries bytes beyond its defined fields.
    #[error("trailing bytes after handshake message: {0}")]
    TrailingData(usize),

    /// A field inside the payload could not be parsed.
    #[error("malformed handshake payload: {0}")]
    MalformedPayload(String),
}

// ── Protocol version ──────────────────────────────────────────────────────────

/// A `(major, minor)` protocol version pair, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: i16,
    pub minor: i16,
}

impl ProtocolVersion {
    /// The version this build speaks.
    pub const CURRENT: ProtocolVersion = ProtocolVersion {
        major: PROTOCOL_MAJOR,
        minor: PROTOCOL_MINOR,
    };

    pub const fn new(major: i16, minor: i16) -> Self {
        Self { major, minor }
    }

    /// Returns `true` when a server advertising `self` can drive this client.
    ///
    /// The server must be at least as new as the client, comparing
    /// `(major, minor)` lexicographically.
    pub fn supports(&self, client: ProtocolVersion) -> bool {
        *self >= client
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a `Hello` message (server side of the handshake).
///
/// The session engine never sends this; it exists for tests and for tools
/// that impersonate a server.
pub fn encode_hello(version: ProtocolVersion) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PROTOCOL_TAG.len() + 4);
    buf.extend_from_slice(PROTOCOL_TAG);
    buf.extend_from_slice(&version.major.to_be_bytes());
    buf.extend_from_slice(&version.minor.to_be_bytes());
    buf
}

/// Encodes a `HelloBack` message carrying the client's version and name.
pub fn encode_hello_back(version: ProtocolVersion, name: &str) -> Vec<u8> {
    let name_bytes = name.as_bytes();
    let mut buf = Vec::with_capacity(PROTOCOL_TAG.len() + 8 + name_bytes.len());
    buf.extend_from_slice(PROTOCOL_TAG);
    buf.extend_from_slice(&version.major.to_be_bytes());
    buf.extend_from_slice(&version.minor.to_be_bytes());
    buf.extend_from_slice(&(name_bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(name_bytes);
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes a `Hello` message, returning the server's advertised version.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the tag is wrong, the message is truncated,
/// or bytes trail the version fields.
pub fn decode_hello(payload: &[u8]) -> Result<ProtocolVersion, ProtocolError> {
    let rest = strip_tag(payload)?;
    let (version, rest) = read_version(rest)?;
    if !rest.is_empty() {
        return Err(ProtocolError::TrailingData(rest.len()));
    }
    Ok(version)
}

/// Decodes a `HelloBack` message, returning the client's version and name.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the tag is wrong, any field is truncated,
/// the name is not valid UTF-8, or bytes trail the name.
pub fn decode_hello_back(payload: &[u8]) -> Result<(ProtocolVersion, String), ProtocolError> {
    let rest = strip_tag(payload)?;
    let (version, rest) = read_version(rest)?;
    if rest.len() < 4 {
        return Err(ProtocolError::InsufficientData {
            needed: PROTOCOL_TAG.len() + 8,
            available: payload.len(),
        });
    }
    let name_len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
    let rest = &rest[4..];
    if rest.len() < name_len {
        return Err(ProtocolError::InsufficientData {
            needed: PROTOCOL_TAG.len() + 8 + name_len,
            available: payload.len(),
        });
    }
    let name = std::str::from_utf8(&rest[..name_len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("name is not UTF-8: {e}")))?
        .to_string();
    if rest.len() > name_len {
        return Err(ProtocolError::TrailingData(rest.len() - name_len));
    }
    Ok((version, name))
}

fn strip_tag(payload: &[u8]) -> Result<&[u8], ProtocolError> {
    if payload.len() < PROTOCOL_TAG.len() {
        return Err(ProtocolError::InsufficientData {
            needed: PROTOCOL_TAG.len() + 4,
            available: payload.len(),
        });
    }
    if &payload[..PROTOCOL_TAG.len()] != PROTOCOL_TAG {
        return Err(ProtocolError::BadTag);
    }
    Ok(&payload[PROTOCOL_TAG.len()..])
}

fn read_version(bytes: &[u8]) -> Result<(ProtocolVersion, &[u8]), ProtocolError> {
    if bytes.len() < 4 {
        return Err(ProtocolError::InsufficientData {
            needed: PROTOCOL_TAG.len() + 4,
            available: PROTOCOL_TAG.len() + bytes.len(),
        });
    }
    let major = i16::from_be_bytes([bytes[0], bytes[1]]);
    let minor = i16::from_be_bytes([bytes[2], bytes[3]]);
    Ok((ProtocolVersion { major, minor }, &bytes[4..]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
