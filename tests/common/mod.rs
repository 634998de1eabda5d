//! Scripted WHOIS server shared by the integration tests
//!
//! Each server accepts exactly one connection, waits for the query line,
//! writes its canned chunks and then ends the exchange the way the test asks.

#![allow(dead_code)] // Not every test file uses every helper

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;
use whois_socket::ConnectionParameters;

const SERVER_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// How the fake server ends the connection after answering
#[derive(Debug, Clone, Copy)]
pub enum Finish {
    /// Orderly shutdown of the write half
    Close,
    /// Abortive close (SO_LINGER 0), the peer sees a reset
    Reset,
    /// Keep the connection open until the client goes away
    Hold,
}

/// What the server observed during the exchange
#[derive(Debug)]
pub struct Exchange {
    /// Every byte the client sent
    pub received: Vec<u8>,
    /// Whether the client closed its end before the server gave up waiting
    pub client_closed: bool,
    pub peer: SocketAddr,
}

pub struct FakeWhoisServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Exchange>,
}

impl FakeWhoisServer {
    pub async fn start<I, C>(chunks: I, finish: Finish) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let chunks: Vec<Vec<u8>> = chunks
            .into_iter()
            .map(|chunk| chunk.as_ref().to_vec())
            .collect();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake WHOIS server");
        let addr = listener.local_addr().expect("Fake server has no local addr");

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.expect("Failed to accept client");
            serve(stream, peer, chunks, finish).await
        });

        Self { addr, handle }
    }

    pub fn params(&self) -> ConnectionParameters {
        ConnectionParameters::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// Wait for the server task and return what it saw
    pub async fn exchange(self) -> Exchange {
        timeout(SERVER_IO_TIMEOUT, self.handle)
            .await
            .expect("Fake server did not finish")
            .expect("Fake server panicked")
    }
}

async fn serve(
    mut stream: TcpStream,
    peer: SocketAddr,
    chunks: Vec<Vec<u8>>,
    finish: Finish,
) -> Exchange {
    let mut received = Vec::new();
    let mut client_closed = read_query_line(&mut stream, &mut received).await;

    for chunk in chunks {
        stream.write_all(&chunk).await.expect("Failed to write chunk");
        stream.flush().await.expect("Failed to flush chunk");
    }

    match finish {
        Finish::Close => {
            stream.shutdown().await.expect("Failed to shut down write half");
            if !client_closed {
                client_closed = drain(&mut stream, &mut received).await;
            }
        }
        Finish::Reset => {
            // Give the client time to consume the data before the RST lands
            tokio::time::sleep(Duration::from_millis(100)).await;
            abort(stream);
        }
        Finish::Hold => {
            if !client_closed {
                client_closed = drain(&mut stream, &mut received).await;
            }
        }
    }

    Exchange {
        received,
        client_closed,
        peer,
    }
}

/// Read until the first CRLF; returns true if the client closed first
async fn read_query_line(stream: &mut TcpStream, received: &mut Vec<u8>) -> bool {
    let mut buf = [0u8; 512];
    loop {
        match timeout(SERVER_IO_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(0)) => return true,
            Ok(Ok(n)) => {
                received.extend_from_slice(&buf[..n]);
                if received.windows(2).any(|w| w == b"\r\n") {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Read whatever else the client sends; true once it closes its end
async fn drain(stream: &mut TcpStream, received: &mut Vec<u8>) -> bool {
    let mut buf = [0u8; 512];
    loop {
        match timeout(SERVER_IO_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(0)) => return true,
            Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
            _ => return false,
        }
    }
}

#[allow(deprecated)]
fn abort(stream: TcpStream) {
    stream
        .set_linger(Some(Duration::ZERO))
        .expect("Failed to set SO_LINGER");
    drop(stream);
}

/// Address on loopback where nothing is listening
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("Probe listener has no local addr");
    drop(listener);
    addr
}

/// Install a test subscriber; filter comes from RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
