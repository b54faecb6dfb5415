//! Optional overrides for connection, TLS and protocol settings

use std::collections::BTreeSet;
use std::path::Path;

use dicom_dictionary_std::uids;
use dimse::{
    AssociateRequest, Connection, FindModel, Priority, QueryOption, RetrieveModel, TlsConfig,
    UserIdentity,
};
use serde::{Deserialize, Serialize};

use super::DicomNode;
use crate::error::ConfigError;

/// Implicit VR Little Endian first, then the explicit syntaxes
pub const IVR_LE_FIRST: [&str; 3] = [
    uids::IMPLICIT_VR_LITTLE_ENDIAN,
    uids::EXPLICIT_VR_LITTLE_ENDIAN,
    uids::EXPLICIT_VR_BIG_ENDIAN,
];

/// Advanced parameters of a query/retrieve operation.
///
/// Every field has a default so a partial TOML document is enough:
///
/// ```toml
/// find_model = "patient-root"
/// query_options = ["relational"]
/// priority = "high"
///
/// [connect]
/// connect_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedParams {
    /// C-FIND information model, study-root when unset
    pub find_model: Option<FindModel>,

    /// C-GET information model, study-root when unset
    pub retrieve_model: Option<RetrieveModel>,

    /// Extended negotiation options
    pub query_options: BTreeSet<QueryOption>,

    /// Transfer syntaxes proposed for the query/retrieve context, in order
    pub tsuid_order: Vec<String>,

    pub priority: Priority,

    /// Proxy (`host:port`) used to reach the called node
    pub proxy: Option<String>,

    /// User identity sent with the association request
    pub identity: Option<UserIdentity>,

    pub connect: ConnectOptions,

    /// TLS settings applied to both sides of the connection
    pub tls: Option<TlsConfig>,
}

/// Connection tuning applied to the local connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub max_pdu_len_rcv: u32,
    pub max_pdu_len_snd: u32,
    pub connect_timeout_ms: u64,
    pub acse_timeout_ms: u64,
    pub dimse_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub tcp_no_delay: bool,
}

impl Default for AdvancedParams {
    fn default() -> Self {
        Self {
            find_model: None,
            retrieve_model: None,
            query_options: BTreeSet::new(),
            tsuid_order: IVR_LE_FIRST.iter().map(|s| s.to_string()).collect(),
            priority: Priority::default(),
            proxy: None,
            identity: None,
            connect: ConnectOptions::default(),
            tls: None,
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        let conn = Connection::default();
        Self {
            max_pdu_len_rcv: conn.max_pdu_len_rcv,
            max_pdu_len_snd: conn.max_pdu_len_snd,
            connect_timeout_ms: conn.connect_timeout_ms,
            acse_timeout_ms: conn.acse_timeout_ms,
            dimse_timeout_ms: conn.dimse_timeout_ms,
            idle_timeout_ms: conn.idle_timeout_ms,
            tcp_no_delay: conn.tcp_no_delay,
        }
    }
}

impl AdvancedParams {
    /// Parse and validate parameters from TOML text
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let params: AdvancedParams = toml::from_str(toml_str)?;
        params.validate()?;
        Ok(params)
    }

    /// Parse and validate parameters from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tsuid_order.is_empty() {
            return Err(ConfigError::Invalid(
                "tsuid_order must name at least one transfer syntax".into(),
            ));
        }

        if self.connect.max_pdu_len_rcv == 0 || self.connect.max_pdu_len_snd == 0 {
            return Err(ConfigError::Invalid(
                "Max PDU length must be greater than 0".into(),
            ));
        }

        if let Some(tls) = &self.tls {
            if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "TLS requires both a certificate and a key".into(),
                ));
            }
        }

        Ok(())
    }

    /// Information model for C-FIND
    pub fn resolved_find_model(&self) -> FindModel {
        self.find_model.unwrap_or_default()
    }

    /// Information model for C-GET
    pub fn resolved_retrieve_model(&self) -> RetrieveModel {
        self.retrieve_model.unwrap_or_default()
    }

    pub fn query_options(&self) -> Vec<QueryOption> {
        self.query_options.iter().copied().collect()
    }

    pub fn is_relational(&self) -> bool {
        self.query_options.contains(&QueryOption::Relational)
    }

    /// Point the request and the remote connection at the called node
    pub fn configure_connect(
        &self,
        rq: &mut AssociateRequest,
        remote: &mut Connection,
        called: &DicomNode,
    ) {
        rq.called_aet = called.aet.clone();
        rq.user_identity = self.identity.clone();
        remote.hostname = called.hostname.clone();
        remote.port = called.port;
        remote.proxy = self.proxy.clone();
    }

    /// Identify the local side as the calling node
    pub fn configure_bind(&self, rq: &mut AssociateRequest, conn: &mut Connection, calling: &DicomNode) {
        rq.calling_aet = calling.aet.clone();
        conn.hostname = calling.hostname.clone();
        conn.port = calling.port;
    }

    /// Apply timeouts and PDU settings to the local connection
    pub fn configure(&self, conn: &mut Connection) {
        let opts = &self.connect;
        conn.max_pdu_len_rcv = opts.max_pdu_len_rcv;
        conn.max_pdu_len_snd = opts.max_pdu_len_snd;
        conn.connect_timeout_ms = opts.connect_timeout_ms;
        conn.acse_timeout_ms = opts.acse_timeout_ms;
        conn.dimse_timeout_ms = opts.dimse_timeout_ms;
        conn.idle_timeout_ms = opts.idle_timeout_ms;
        conn.tcp_no_delay = opts.tcp_no_delay;
    }

    /// Enable TLS on both connections when configured
    pub fn configure_tls(&self, conn: &mut Connection, remote: &mut Connection) -> Result<(), ConfigError> {
        let Some(tls) = &self.tls else {
            return Ok(());
        };

        #[cfg(feature = "tls")]
        dimse::tls::check_tls_files(tls).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        conn.tls = Some(tls.clone());
        remote.tls = Some(tls.clone());
        Ok(())
    }
}
