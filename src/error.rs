use std::io::{self, ErrorKind};
use thiserror::Error;

/// Category used for name resolution failures, which carry no useful `ErrorKind`.
pub const RESOLVE_ERROR_CLASS: &str = "ResolveError";

/// `ErrorKind`s treated as connection-class even without an OS error code.
const CONNECTION_ERROR_KINDS: &[ErrorKind] = &[
    ErrorKind::ConnectionRefused,
    ErrorKind::ConnectionReset,
    ErrorKind::ConnectionAborted,
    ErrorKind::NotConnected,
    ErrorKind::AddrInUse,
    ErrorKind::AddrNotAvailable,
    ErrorKind::BrokenPipe,
    ErrorKind::TimedOut,
    ErrorKind::UnexpectedEof,
    ErrorKind::Interrupted,
    ErrorKind::WouldBlock,
    ErrorKind::HostUnreachable,
    ErrorKind::NetworkUnreachable,
    ErrorKind::NetworkDown,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid bind port: {0}")]
    InvalidBindPort(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Normalized connection failure.
///
/// Carries the category and message of the transport failure it replaced,
/// nothing else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct ConnectionError {
    class: String,
    message: String,
}

impl ConnectionError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O failure, using its `ErrorKind` name as the category.
    pub fn from_io(err: &io::Error) -> Self {
        Self::new(format!("{:?}", err.kind()), err.to_string())
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug)]
pub enum WhoisError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A failure outside the connection-class taxonomy, passed through untouched.
    #[error("IO error: {0}")]
    Io(#[source] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WhoisError {
    pub fn is_connection(&self) -> bool {
        matches!(self, WhoisError::Connection(_))
    }
}

/// Failure raised inside a single socket exchange, before normalization.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    pub fn is_connection_failure(&self) -> bool {
        match self {
            TransportError::Resolve { .. } => true,
            TransportError::Io(err) => is_connection_failure(err),
        }
    }
}

impl From<TransportError> for WhoisError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Resolve { host, source } => WhoisError::Connection(
                ConnectionError::new(RESOLVE_ERROR_CLASS, format!("{}: {}", host, source)),
            ),
            TransportError::Io(err) if is_connection_failure(&err) => {
                WhoisError::Connection(ConnectionError::from_io(&err))
            }
            TransportError::Io(err) => WhoisError::Io(err),
        }
    }
}

/// Whether an I/O error belongs to the connection-class taxonomy.
///
/// Any error carrying an OS error code counts, except memory exhaustion.
pub fn is_connection_failure(err: &io::Error) -> bool {
    if err.kind() == ErrorKind::OutOfMemory {
        return false;
    }
    err.raw_os_error().is_some() || CONNECTION_ERROR_KINDS.contains(&err.kind())
}

pub type Result<T> = std::result::Result<T, WhoisError>;
