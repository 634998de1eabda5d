//! Minimal WHOIS client transport.
//!
//! Given an already resolved server and a query line, [`SocketHandler`] opens
//! one TCP connection, sends `<query>\r\n`, reads until the server closes (or
//! resets) the connection and hands back the raw response bytes.

pub mod config;
pub mod error;
pub mod handler;
pub mod response;

pub use config::{ConnectionParameters, DEFAULT_WHOIS_PORT};
pub use error::{ConnectionError, WhoisError};
pub use handler::{QueryHandler, SocketHandler};
pub use response::{EndOfStream, WhoisResponse};
