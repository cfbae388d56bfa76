//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use cnxmd_proxy::config::ProxyConfig;
use cnxmd_proxy::protocol::reader::{read_header, DEFAULT_MAX_HEADER_LEN};
use cnxmd_proxy::protocol::Header;
use cnxmd_proxy::{ProxyServer, Shutdown};

/// What the destination saw on one connection.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Received {
    pub header: Header,
    pub header_len: usize,
    pub payload: Vec<u8>,
}

/// Start a destination that strips the CNXMD header, reads the payload to
/// end of stream, answers with `reply`, and reports what it saw.
pub async fn start_header_sink(reply: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let (header_len, header) = match read_header(&mut reader, DEFAULT_MAX_HEADER_LEN).await {
                    Ok(parsed) => parsed,
                    Err(_) => return,
                };
                let mut payload = Vec::new();
                let _ = reader.read_to_end(&mut payload).await;

                let socket = reader.get_mut();
                let _ = socket.write_all(reply).await;
                let _ = socket.shutdown().await;
                let _ = tx.send(Received {
                    header,
                    header_len,
                    payload,
                });
            });
        }
    });

    (addr, rx)
}

/// Start a destination that accepts, strips the header, and then holds the
/// connection open without ever closing its side.
#[allow(dead_code)]
pub async fn start_silent_destination() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let _ = read_header(&mut reader, DEFAULT_MAX_HEADER_LEN).await;
                let mut buf = [0u8; 1024];
                while let Ok(n) = reader.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
                // Peer finished sending; keep our write side open forever.
                std::future::pending::<()>().await;
            });
        }
    });

    addr
}

/// A free loopback port that nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start the proxy with `config`, returning its address and the shutdown
/// handle plus the channel used to push reloaded configs.
#[allow(dead_code)]
pub async fn start_proxy(
    config: ProxyConfig,
) -> (
    SocketAddr,
    Shutdown,
    mpsc::UnboundedSender<ProxyConfig>,
    tokio::task::JoinHandle<Result<(), cnxmd_proxy::server::ServerError>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown: broadcast::Receiver<()> = shutdown.subscribe();

    let server = ProxyServer::new(config);
    let handle = tokio::spawn(server.run(listener, updates_rx, server_shutdown));
    tokio::time::sleep(Duration::from_millis(20)).await;

    (addr, shutdown, updates_tx, handle)
}

/// Proxy config pointed at `destination` with the given metadata.
pub fn proxy_config(destination: SocketAddr, metadata: &[(&str, &str)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.destination.host = destination.ip().to_string();
    config.destination.port = destination.port();
    config.timeouts.drain_secs = 2;
    for (k, v) in metadata {
        config.metadata.insert(k.to_string(), v.to_string());
    }
    config
}
