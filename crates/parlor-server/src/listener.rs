//! TCP listener and per-connection transport tasks.
//!
//! Each accepted connection gets one driver task that multiplexes socket
//! reads and the outbound queue. The driver only decodes bytes and forwards
//! events; every relay decision happens in the relay loop. Any transport
//! fault is converted into that connection's close path and never reaches
//! the rest of the process.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use parlor_core::{ConnectionHandle, ConnectionId, RelayService, WordListFilter};
use parlor_protocol::FrameDecoder;

use crate::config::{Config, TransportConfig};
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::relay::{run_relay, RelayEvent};

/// Socket read chunk size.
const READ_CHUNK: usize = 8 * 1024;

/// Bind the listener and run the relay.
///
/// # Errors
///
/// Returns an error if the listen address is invalid or cannot be bound.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Network on {}", listener.local_addr()?);

    serve(listener, config).await
}

/// Accept connections forever, spawning a driver task per connection.
async fn serve(listener: TcpListener, config: Config) -> Result<()> {
    let filter = WordListFilter::new(&config.moderation.words)
        .with_grawlix(config.moderation.grawlix.clone());
    let service = RelayService::new(Box::new(filter), config.relay.send_own_messages_back);

    let (events, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_relay(
        service,
        events_rx,
        config.status_interval_secs,
    ));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };

        debug!(peer = %peer, "New client");
        let events = events.clone();
        let transport = config.transport.clone();
        let buffer_capacity = config.relay.buffer_capacity;
        tokio::spawn(drive_connection(
            stream,
            peer,
            transport,
            buffer_capacity,
            events,
        ));
    }
}

/// Drive one connection until its transport ends, then emit the close event.
async fn drive_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    transport: TransportConfig,
    buffer_capacity: usize,
    events: mpsc::UnboundedSender<RelayEvent>,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let id = ConnectionId::from_addr(&peer);

    tune_socket(&stream, &transport, &id);

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    if events
        .send(RelayEvent::Opened(ConnectionHandle::new(
            id.clone(),
            outbound,
        )))
        .is_err()
    {
        return;
    }

    let (mut reader, mut writer) = stream.split();
    let mut decoder = FrameDecoder::with_capacity(buffer_capacity);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            biased;

            queued = outbound_rx.recv() => {
                match queued {
                    Some(payload) => {
                        if let Err(e) = writer.write_all(&payload).await {
                            debug!(connection = %id, error = %e, "Write failed");
                            break;
                        }
                    }
                    // All handles dropped: the relay already tore us down.
                    None => break,
                }
            }

            read = reader.read(&mut chunk) => {
                match read {
                    Ok(0) => {
                        debug!(connection = %id, "Connection closed by peer");
                        break;
                    }
                    Ok(n) => {
                        match decoder.feed(&chunk[..n]) {
                            Ok(()) => {
                                while let Some(frame) = decoder.next_frame() {
                                    if events.send(RelayEvent::Frame(id.clone(), frame)).is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                // Buffer discarded, chunk dropped; the
                                // connection stays open.
                                warn!(connection = %id, error = %e, "Receive buffer overflow");
                                metrics::record_buffer_overflow();
                            }
                        }
                    }
                    Err(e) => {
                        warn!(connection = %id, error = %e, "Read error");
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(RelayEvent::Closed(id));
}

/// Apply socket tuning. Pass-through configuration; failures are logged,
/// never fatal.
fn tune_socket(stream: &TcpStream, transport: &TransportConfig, id: &ConnectionId) {
    if let Err(e) = stream.set_nodelay(transport.no_delay) {
        warn!(connection = %id, error = %e, "Failed to set TCP_NODELAY");
    }

    if transport.keep_alive_secs > 0 {
        let keepalive =
            TcpKeepalive::new().with_time(Duration::from_secs(transport.keep_alive_secs));
        if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
            warn!(connection = %id, error = %e, "Failed to enable TCP keep-alive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_protocol::{frames, SUBSCRIBE_ACK};

    async fn start_server(config: Config) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, config));
        addr
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.metrics.enabled = false;
        config
    }

    async fn subscribe(addr: SocketAddr, channel: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(&frames::encode_subscribe(channel))
            .await
            .unwrap();
        let mut ack = vec![0u8; SUBSCRIBE_ACK.len()];
        stream.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, SUBSCRIBE_ACK);
        stream
    }

    async fn read_payload_frame(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before a frame arrived");
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if text.contains(frames::PAYLOAD_END) {
                return text.into_owned();
            }
        }
    }

    #[tokio::test]
    async fn test_two_clients_exchange_over_tcp() {
        let addr = start_server(test_config()).await;

        let mut alice = subscribe(addr, "Global").await;
        let mut bob = subscribe(addr, "Global").await;

        bob.write_all(&frames::encode_payload(
            r#"{"action":"chat","message":"hello"}"#,
        ))
        .await
        .unwrap();

        // Echo is on by default, so both members receive the frame.
        let to_alice = read_payload_frame(&mut alice).await;
        assert!(to_alice.starts_with(frames::PAYLOAD_START));
        assert!(to_alice.contains("hello"));

        let to_bob = read_payload_frame(&mut bob).await;
        assert!(to_bob.contains("hello"));
    }

    #[tokio::test]
    async fn test_get_servers_over_tcp() {
        let addr = start_server(test_config()).await;

        let mut client = subscribe(addr, "lobby").await;
        client
            .write_all(&frames::encode_payload(
                r#"{"action":"getServers","user":"wanda"}"#,
            ))
            .await
            .unwrap();

        let response = read_payload_frame(&mut client).await;
        assert!(response.contains(r#""action":"gotServers""#));
        assert!(response.contains("Big Lobby"));
        assert!(response.contains(r#""user":"wanda""#));
    }

    #[tokio::test]
    async fn test_channels_are_isolated_over_tcp() {
        let addr = start_server(test_config()).await;

        let mut red = subscribe(addr, "red").await;
        let mut blue = subscribe(addr, "blue").await;

        red.write_all(&frames::encode_payload(r#"{"action":"ping"}"#))
            .await
            .unwrap();
        // Sender sees the echo; the other channel must not.
        read_payload_frame(&mut red).await;

        blue.write_all(&frames::encode_payload(r#"{"action":"pong"}"#))
            .await
            .unwrap();
        let seen = read_payload_frame(&mut blue).await;
        assert!(seen.contains("pong"));
        assert!(!seen.contains("ping"));
    }
}
