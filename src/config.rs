use crate::error::ConfigError;
use std::net::IpAddr;
use std::time::Duration;

/// Registered TCP port for WHOIS (RFC 3912).
pub const DEFAULT_WHOIS_PORT: u16 = 43;

const MAX_TIMEOUT_SECS: u64 = 300;

/// Everything needed to open the TCP connection for one query.
///
/// Host and port are handed to the resolver as-is; nothing here is checked
/// before the connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// WHOIS server host name or address literal
    pub host: String,

    /// WHOIS server port
    pub port: u16,

    /// Local address to bind before connecting
    pub local_host: Option<IpAddr>,

    /// Local port to bind before connecting
    pub local_port: Option<u16>,

    /// Deadline covering name resolution and connect (None = wait forever)
    pub connect_timeout: Option<Duration>,

    /// Idle deadline for the write and for each read (None = wait forever)
    pub read_timeout: Option<Duration>,
}

impl ConnectionParameters {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            local_host: None,
            local_port: None,
            connect_timeout: None,
            read_timeout: None,
        }
    }

    /// Parameters for `host` on the standard WHOIS port
    pub fn for_host(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_WHOIS_PORT)
    }

    pub fn with_local_host(mut self, local_host: IpAddr) -> Self {
        self.local_host = Some(local_host);
        self
    }

    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = Some(local_port);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Whether the local end must be bound before connecting
    pub fn binds_locally(&self) -> bool {
        self.local_host.is_some() || self.local_port.is_some()
    }

    /// Apply overrides from environment variables
    /// Returns Err if a present variable cannot be parsed or fails validation
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(bind_host) = non_empty_var("WHOIS_BIND_HOST") {
            self.local_host = Some(
                bind_host
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidBindAddress(bind_host))?,
            );
        }

        if let Some(bind_port) = non_empty_var("WHOIS_BIND_PORT") {
            self.local_port = Some(
                bind_port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidBindPort(bind_port))?,
            );
        }

        if let Some(connect_timeout) = non_empty_var("WHOIS_CONNECT_TIMEOUT") {
            self.connect_timeout = Some(parse_timeout_secs(&connect_timeout)?);
        }

        if let Some(read_timeout) = non_empty_var("WHOIS_READ_TIMEOUT") {
            self.read_timeout = Some(parse_timeout_secs(&read_timeout)?);
        }

        self.validate()?;

        Ok(self)
    }

    /// Validate the locally configured knobs (timeouts only)
    pub fn validate(&self) -> Result<(), ConfigError> {
        for timeout in [self.connect_timeout, self.read_timeout].into_iter().flatten() {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(
                    "Timeout must be greater than 0".to_string(),
                ));
            }
            if timeout.as_secs() > MAX_TIMEOUT_SECS {
                return Err(ConfigError::InvalidTimeout(format!(
                    "Timeout too large (max {} seconds)",
                    MAX_TIMEOUT_SECS
                )));
            }
        }

        Ok(())
    }
}

impl From<(&str, u16)> for ConnectionParameters {
    fn from((host, port): (&str, u16)) -> Self {
        Self::new(host, port)
    }
}

impl From<(String, u16)> for ConnectionParameters {
    fn from((host, port): (String, u16)) -> Self {
        Self::new(host, port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parse a whole number of seconds
fn parse_timeout_secs(s: &str) -> Result<Duration, ConfigError> {
    let secs = s
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidTimeout(s.to_string()))?;
    Ok(Duration::from_secs(secs))
}
