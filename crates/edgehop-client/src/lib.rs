//! edgehop-client library entry point.
//!
//! Re-exports the session engine modules so the binary in `main.rs` and the
//! integration tests in `tests/` share one module tree.
//!
//! # What does the client do?
//!
//! The client attaches to the local screen and connects to a remote input
//! server. After a versioned `Hello`/`HelloBack` handshake the server drives
//! the local screen: when its cursor crosses onto this machine it sends
//! keyboard, mouse, and game-controller events here, and the two sides keep
//! their clipboards in sync. The engine is a single-threaded state machine
//! fed by a tagged event stream; everything platform- or transport-specific
//! sits behind a collaborator trait.

/// Session events, lifecycle events, and the event bus the engine runs on.
pub mod event;

/// In-tree mock collaborators shared by tests and the diagnostic binary.
pub mod mock;

/// Server proxy collaborator traits and the diagnostic frame logger.
pub mod proxy;

/// The platform screen collaborator trait and its value types.
pub mod screen;

/// Connection state machine, dispatcher, and suspend/resume handling.
pub mod session;

/// The layered stream pipeline: transport seam, packet framing, crypto.
pub mod stream;

/// Tokio TCP implementation of the transport seam.
pub mod tcp;

pub use event::{event_channel, ClientEvent, EventBus, EventKind, EventSink, SessionEvent};
pub use screen::Screen;
pub use session::{Client, ClientConfig, SessionState};
pub use stream::{
    ResolvedEndpoint, ServerEndpoint, Stream, StreamError, StreamFilterFactory, TransportFactory,
};
