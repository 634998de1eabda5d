use async_trait::async_trait;
use bytes::BytesMut;
use std::future::Future;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::ConnectionParameters;
use crate::error::{Result, TransportError, WhoisError};
use crate::response::{EndOfStream, WhoisResponse};

/// WHOIS servers wait for a CRLF-terminated query line before answering
const QUERY_TERMINATOR: &[u8] = b"\r\n";

const READ_CHUNK_SIZE: usize = 4096;

/// Performs one WHOIS exchange against an already resolved server.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn call(&self, query: &str, params: &ConnectionParameters) -> Result<WhoisResponse>;
}

/// Default query handler: one plain TCP connection per query.
///
/// Holds no state, so a single instance can serve any number of concurrent
/// calls; each call owns its own socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketHandler;

impl SocketHandler {
    pub fn new() -> Self {
        Self
    }

    /// Send `query` and return the full response.
    ///
    /// Connection-class failures (refused, unreachable, timed out, name
    /// resolution, ...) come back as [`WhoisError::Connection`]; anything
    /// else is returned as [`WhoisError::Io`] with the original error intact.
    pub async fn call(&self, query: &str, params: &ConnectionParameters) -> Result<WhoisResponse> {
        self.execute(query, params).await.map_err(|err| {
            if err.is_connection_failure() {
                warn!(
                    "WHOIS query to {}:{} failed: {}",
                    params.host, params.port, err
                );
            }
            WhoisError::from(err)
        })
    }

    /// Connect, write the query line, read until EOF or reset.
    ///
    /// The stream is dropped, and the socket closed, on every path out of
    /// this function once the connection exists.
    pub async fn execute(
        &self,
        query: &str,
        params: &ConnectionParameters,
    ) -> std::result::Result<WhoisResponse, TransportError> {
        let mut stream = with_deadline(params.connect_timeout, "connect", connect(params)).await?;

        with_deadline(params.read_timeout, "write", write_query(&mut stream, query)).await?;
        trace!(
            "Sent {} byte query to {}:{}",
            query.len() + QUERY_TERMINATOR.len(),
            params.host,
            params.port
        );

        let response = read_response(&mut stream, params.read_timeout).await?;
        drop(stream);

        debug!(
            "Received {} bytes from {}:{} ({:?})",
            response.len(),
            params.host,
            params.port,
            response.end_of_stream()
        );
        Ok(response)
    }
}

#[async_trait]
impl QueryHandler for SocketHandler {
    async fn call(&self, query: &str, params: &ConnectionParameters) -> Result<WhoisResponse> {
        SocketHandler::call(self, query, params).await
    }
}

/// Resolve the host and try each address in turn until one accepts
async fn connect(params: &ConnectionParameters) -> std::result::Result<TcpStream, TransportError> {
    let addrs = lookup_host((params.host.as_str(), params.port))
        .await
        .map_err(|source| TransportError::Resolve {
            host: params.host.clone(),
            source,
        })?;

    let mut resolved_any = false;
    let mut last_error = None;

    for addr in addrs {
        resolved_any = true;

        if let Some(local_host) = params.local_host {
            if local_host.is_ipv4() != addr.is_ipv4() {
                trace!("Skipping {}: family differs from bind address {}", addr, local_host);
                continue;
            }
        }

        debug!("Connecting to {} for {}", addr, params.host);
        match connect_addr(addr, params).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(err) => TransportError::Io(err),
        None if resolved_any => TransportError::Io(io::Error::new(
            ErrorKind::AddrNotAvailable,
            "no resolved address matches the bind address family",
        )),
        None => TransportError::Resolve {
            host: params.host.clone(),
            source: io::Error::new(ErrorKind::NotFound, "no addresses returned"),
        },
    })
}

async fn connect_addr(addr: SocketAddr, params: &ConnectionParameters) -> io::Result<TcpStream> {
    if !params.binds_locally() {
        return TcpStream::connect(addr).await;
    }

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    let local_ip = params.local_host.unwrap_or(if addr.is_ipv4() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    });
    socket.bind(SocketAddr::new(local_ip, params.local_port.unwrap_or(0)))?;

    socket.connect(addr).await
}

/// Write `query` followed by CRLF, nothing else
async fn write_query<W>(writer: &mut W, query: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = BytesMut::with_capacity(query.len() + QUERY_TERMINATOR.len());
    payload.extend_from_slice(query.as_bytes());
    payload.extend_from_slice(QUERY_TERMINATOR);

    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Accumulate chunks in arrival order until EOF.
///
/// A peer reset ends the response; whatever arrived before it is the answer.
async fn read_response<R>(
    reader: &mut R,
    read_timeout: Option<Duration>,
) -> io::Result<WhoisResponse>
where
    R: AsyncRead + Unpin,
{
    let mut body = BytesMut::with_capacity(READ_CHUNK_SIZE);

    let end = loop {
        body.reserve(READ_CHUNK_SIZE);
        match with_deadline(read_timeout, "read", reader.read_buf(&mut body)).await {
            Ok(0) => break EndOfStream::Closed,
            Ok(n) => trace!("Read {} bytes ({} total)", n, body.len()),
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                debug!(
                    "Connection reset by peer after {} bytes, keeping partial response",
                    body.len()
                );
                break EndOfStream::Reset;
            }
            Err(e) => return Err(e),
        }
    };

    Ok(WhoisResponse::new(body.freeze(), end))
}

/// Run `fut` under an optional deadline; expiry becomes a `TimedOut` I/O error
async fn with_deadline<T, E, F>(
    limit: Option<Duration>,
    operation: &str,
    fut: F,
) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: From<io::Error>,
{
    match limit {
        Some(limit) => timeout(limit, fut).await.map_err(|_| {
            E::from(io::Error::new(
                ErrorKind::TimedOut,
                format!("{} timed out after {:?}", operation, limit),
            ))
        })?,
        None => fut.await,
    }
}
