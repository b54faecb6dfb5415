use serde::{Deserialize, Serialize};

/// A DICOM network endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicomNode {
    /// Application Entity Title
    pub aet: String,

    /// Host to connect to (called node) or bind to (calling node)
    pub hostname: Option<String>,

    /// TCP port, 0 when unspecified
    #[serde(default)]
    pub port: u16,
}

impl DicomNode {
    /// A node known only by its AE title, typically the calling side
    pub fn new(aet: impl Into<String>) -> Self {
        Self {
            aet: aet.into(),
            hostname: None,
            port: 0,
        }
    }

    /// A node reachable at `hostname:port`
    pub fn with_address(aet: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            aet: aet.into(),
            hostname: Some(hostname.into()),
            port,
        }
    }
}

impl std::fmt::Display for DicomNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.hostname {
            Some(host) => write!(f, "{}@{}:{}", self.aet, host, self.port),
            None => write!(f, "{}", self.aet),
        }
    }
}
