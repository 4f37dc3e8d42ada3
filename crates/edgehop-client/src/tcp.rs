//! Tokio TCP implementation of the transport seam.
//!
//! `connect` spawns one task that dials the server, reports the outcome
//! through the event sink, and then splits into a reader loop and a writer
//! task. Inbound chunks queue on a channel drained by `read`; outbound
//! chunks queue on a channel the writer flushes once the socket is up, which
//! is what lets upper layers (the crypto IV preamble) write before the
//! connection completes.
//!
//! Must run inside a tokio runtime.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{EventSink, SessionEvent};
use crate::stream::{ResolvedEndpoint, Stream, StreamError, TransportFactory};

const READ_BUFFER_SIZE: usize = 8192;

/// Produces a fresh [`TcpTransport`] per connect attempt.
pub struct TcpTransportFactory;

impl TransportFactory for TcpTransportFactory {
    fn create(&self, sink: EventSink) -> Box<dyn Stream> {
        Box::new(TcpTransport {
            sink,
            incoming: None,
            outgoing: None,
            lookahead: None,
        })
    }
}

pub struct TcpTransport {
    sink: EventSink,
    incoming: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    /// One chunk pulled ahead by `has_input`.
    lookahead: Option<Vec<u8>>,
}

impl Stream for TcpTransport {
    fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), StreamError> {
        let addr = match endpoint {
            ResolvedEndpoint::Socket(addr) => *addr,
            ResolvedEndpoint::Opaque(name) => {
                return Err(StreamError::UnsupportedEndpoint(name.clone()))
            }
        };

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.incoming = Some(in_rx);
        self.outgoing = Some(out_tx);

        let sink = self.sink.clone();
        tokio::spawn(async move {
            let socket = match TcpStream::connect(addr).await {
                Ok(socket) => socket,
                Err(e) => {
                    let _ = sink.send(SessionEvent::TransportConnectFailed {
                        reason: e.to_string(),
                    });
                    return;
                }
            };
            let _ = socket.set_nodelay(true);
            let _ = sink.send(SessionEvent::TransportConnected);

            let (mut reader, mut writer) = socket.into_split();

            // Writer: flush queued chunks until the transport is dropped.
            let write_sink = sink.clone();
            tokio::spawn(async move {
                while let Some(chunk) = out_rx.recv().await {
                    if let Err(e) = writer.write_all(&chunk).await {
                        let _ = write_sink.send(SessionEvent::StreamOutputError {
                            reason: e.to_string(),
                        });
                        return;
                    }
                }
                // Channel closed: the owner shut us down. Say goodbye.
                let _ = writer.shutdown().await;
            });

            // Reader: forward chunks and signal input until EOF or error.
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        let _ = sink.send(SessionEvent::StreamInputShutdown);
                        return;
                    }
                    Ok(n) => {
                        if in_tx.send(buf[..n].to_vec()).is_err() {
                            // Transport dropped; nobody is reading.
                            return;
                        }
                        let _ = sink.send(SessionEvent::StreamInputReady);
                    }
                    Err(e) => {
                        debug!("socket read failed: {e}");
                        let _ = sink.send(SessionEvent::StreamDisconnected);
                        return;
                    }
                }
            }
        });

        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        match &self.outgoing {
            Some(tx) => tx
                .send(payload.to_vec())
                .map_err(|_| StreamError::NotConnected),
            None => Err(StreamError::NotConnected),
        }
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        if let Some(chunk) = self.lookahead.take() {
            return Ok(Some(chunk));
        }
        match self.incoming.as_mut() {
            Some(rx) => Ok(rx.try_recv().ok()),
            None => Ok(None),
        }
    }

    fn has_input(&mut self) -> bool {
        if self.lookahead.is_some() {
            return true;
        }
        if let Some(rx) = self.incoming.as_mut() {
            if let Ok(chunk) = rx.try_recv() {
                self.lookahead = Some(chunk);
                return true;
            }
        }
        false
    }

    fn set_decrypt_iv(&mut self, _iv: &[u8]) {}

    fn shutdown(&mut self) {
        // Dropping the sender closes the writer task, which shuts the socket
        // down; dropping the receiver stops the reader at its next send.
        self.outgoing = None;
        self.incoming = None;
        self.lookahead = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
