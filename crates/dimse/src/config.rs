//! Connection objects configured by the caller before an association is opened

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DimseError, Result};

/// One side of an association: where to connect (remote) or bind (local)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Host name or address
    pub hostname: Option<String>,

    /// TCP port, 0 lets the system choose when binding
    #[serde(default)]
    pub port: u16,

    /// Proxy in `host:port` form used to reach the remote side
    pub proxy: Option<String>,

    /// Maximum PDU length we are willing to receive
    #[serde(default = "default_max_pdu")]
    pub max_pdu_len_rcv: u32,

    /// Maximum PDU length we send
    #[serde(default = "default_max_pdu")]
    pub max_pdu_len_snd: u32,

    /// TCP connect timeout in milliseconds (0 = unlimited)
    #[serde(default)]
    pub connect_timeout_ms: u64,

    /// A-ASSOCIATE / A-RELEASE response timeout in milliseconds (0 = unlimited)
    #[serde(default)]
    pub acse_timeout_ms: u64,

    /// DIMSE response timeout in milliseconds (0 = unlimited)
    #[serde(default)]
    pub dimse_timeout_ms: u64,

    /// Idle timeout in milliseconds (0 = unlimited)
    #[serde(default)]
    pub idle_timeout_ms: u64,

    /// Disable Nagle's algorithm
    #[serde(default = "default_true")]
    pub tcp_no_delay: bool,

    /// TLS configuration (optional)
    pub tls: Option<TlsConfig>,
}

/// TLS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert_path: PathBuf,

    /// Path to private key file (PEM format)
    pub key_path: PathBuf,

    /// Path to CA bundle file (optional, for peer certificate verification)
    pub ca_bundle_path: Option<PathBuf>,

    /// Enabled protocol versions, empty means library defaults
    #[serde(default)]
    pub protocols: Vec<String>,

    /// Enabled cipher suites, empty means library defaults
    #[serde(default)]
    pub cipher_suites: Vec<String>,

    /// Require the peer to present a certificate
    #[serde(default)]
    pub need_client_auth: bool,
}

/// User identity negotiation sub-item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub positive_response_requested: bool,
}

/// Fields of the A-ASSOCIATE-RQ that the caller controls
#[derive(Debug, Clone, Default)]
pub struct AssociateRequest {
    pub calling_aet: String,
    pub called_aet: String,
    pub user_identity: Option<UserIdentity>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            hostname: None,
            port: 0,
            proxy: None,
            max_pdu_len_rcv: default_max_pdu(),
            max_pdu_len_snd: default_max_pdu(),
            connect_timeout_ms: 0,
            acse_timeout_ms: 0,
            dimse_timeout_ms: 0,
            idle_timeout_ms: 0,
            tcp_no_delay: true,
            tls: None,
        }
    }
}

impl Connection {
    /// Create a connection pointing at the given host and port
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: Some(hostname.into()),
            port,
            ..Default::default()
        }
    }

    /// Get connection timeout as Duration, `None` when unlimited
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.connect_timeout_ms)
    }

    /// Get ACSE timeout as Duration, `None` when unlimited
    pub fn acse_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.acse_timeout_ms)
    }

    /// Get DIMSE timeout as Duration, `None` when unlimited
    pub fn dimse_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.dimse_timeout_ms)
    }

    /// Check if TLS is enabled
    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Validate this connection as the target of an association
    pub fn validate_remote(&self) -> Result<()> {
        match self.hostname.as_deref() {
            Some(host) if !host.trim().is_empty() => {}
            _ => return Err(DimseError::config("Remote host cannot be empty")),
        }

        if self.port == 0 {
            return Err(DimseError::config("Remote port must be greater than 0"));
        }

        if self.max_pdu_len_rcv == 0 || self.max_pdu_len_snd == 0 {
            return Err(DimseError::config("Max PDU length must be greater than 0"));
        }

        Ok(())
    }
}

impl AssociateRequest {
    /// Validate both AE titles (1-16 characters, no backslash)
    pub fn validate(&self) -> Result<()> {
        validate_ae_title(&self.calling_aet)?;
        validate_ae_title(&self.called_aet)
    }
}

/// Check an AE title against the AE value representation
pub fn validate_ae_title(aet: &str) -> Result<()> {
    let trimmed = aet.trim();
    if trimmed.is_empty() || trimmed.len() > 16 || trimmed.contains('\\') {
        return Err(DimseError::InvalidAeTitle(aet.to_string()));
    }
    Ok(())
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// Default value functions
fn default_max_pdu() -> u32 {
    16378
}

fn default_true() -> bool {
    true
}
