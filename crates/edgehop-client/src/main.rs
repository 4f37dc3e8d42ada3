//! edgehop client entry point.
//!
//! Wires a session to the tokio TCP transport and runs the bus driver: one
//! task that forwards transport events into the bus, fires the handshake
//! timer, drains events into the state machine, and supervises reconnects.
//!
//! ```text
//! main()
//!  └─ Client::new()          -- session + always-on subscriptions
//!  └─ client.connect()       -- first attempt
//!  └─ driver loop
//!       ├─ bus drain          -> Client::handle_event
//!       ├─ lifecycle events   -> log, schedule reconnect
//!       ├─ timer deadline     -> bus.fire_timer_if_due
//!       └─ ctrl-c             -> shutdown
//! ```
//!
//! The screen is the recording mock and the server proxy is the frame
//! logger, which makes this binary a connectivity and handshake probe. In a
//! production build they are replaced by the platform screen driver and a
//! full protocol proxy.

use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use edgehop_client::event::{event_channel, ClientEvent, EventBus};
use edgehop_client::mock::MockScreen;
use edgehop_client::proxy::FrameLogProxyFactory;
use edgehop_client::screen::Screen;
use edgehop_client::session::{Client, ClientConfig};
use edgehop_client::stream::ServerEndpoint;
use edgehop_client::tcp::TcpTransportFactory;

const DEFAULT_PORT: u16 = 24800;

/// Connects to an input-sharing server and logs the session.
#[derive(Parser)]
#[command(name = "edgehop-client", version, about)]
struct Args {
    /// Server address as host[:port].
    #[arg(long, default_value = "127.0.0.1:24800")]
    server: String,

    /// Client name announced in the handshake.
    #[arg(long, default_value = "edgehop")]
    name: String,

    /// Seconds to wait before reconnecting after a failure.
    #[arg(long, default_value_t = 5)]
    reconnect_secs: u64,
}

fn parse_endpoint(value: &str) -> Result<ServerEndpoint> {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid port in '{value}'"))?;
            Ok(ServerEndpoint::network(host, port))
        }
        _ => Ok(ServerEndpoint::network(value, DEFAULT_PORT)),
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let endpoint = parse_endpoint(&args.server)?;
    let reconnect_delay = Duration::from_secs(args.reconnect_secs);

    info!("edgehop client starting, server {endpoint}");

    let (sink, mut events) = event_channel();
    let mut bus = EventBus::new();

    // The mock screen journals input instead of injecting it; swap in the
    // platform screen driver for a production build.
    let screen = Rc::new(MockScreen::new());

    let mut client = Client::new(
        &mut bus,
        sink,
        ClientConfig {
            name: args.name,
            endpoint,
        },
        Rc::clone(&screen) as Rc<dyn Screen>,
        Box::new(TcpTransportFactory),
        Box::new(FrameLogProxyFactory),
    );

    client.connect(&mut bus);

    let mut reconnect_at: Option<Instant> = None;

    loop {
        // Deliver everything queued, one handler at a time.
        while let Some(event) = bus.take_event() {
            client.handle_event(&mut bus, event);
        }

        for event in bus.take_client_events() {
            match event {
                ClientEvent::Connected => info!("session established"),
                ClientEvent::Disconnected => {
                    warn!("session ended; retrying in {}s", args.reconnect_secs);
                    reconnect_at = Some(Instant::now() + reconnect_delay);
                }
                ClientEvent::ConnectionFailed { message, retry } => {
                    warn!("connection failed: {message}");
                    if retry {
                        reconnect_at = Some(Instant::now() + reconnect_delay);
                    }
                }
            }
        }
        if bus.has_pending_events() {
            continue;
        }

        let timer_at = bus.timer_deadline().map(Instant::from_std);
        tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(event) => bus.post(event),
                None => break,
            },
            _ = sleep_until(timer_at.unwrap_or_else(far_future)), if timer_at.is_some() => {
                bus.fire_timer_if_due(std::time::Instant::now());
            }
            _ = sleep_until(reconnect_at.unwrap_or_else(far_future)), if reconnect_at.is_some() => {
                reconnect_at = None;
                client.connect(&mut bus);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    client.shutdown(&mut bus);
    info!("edgehop client stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_with_port() {
        assert_eq!(
            parse_endpoint("server.local:2500").unwrap(),
            ServerEndpoint::network("server.local", 2500)
        );
    }

    #[test]
    fn test_parse_endpoint_without_port_uses_default() {
        assert_eq!(
            parse_endpoint("server.local").unwrap(),
            ServerEndpoint::network("server.local", DEFAULT_PORT)
        );
    }

    #[test]
    fn test_parse_endpoint_rejects_bad_port() {
        assert!(parse_endpoint("server.local:notaport").is_err());
    }
}
