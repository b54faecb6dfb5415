//! DIMSE (DICOM Message Service Element) client side
//!
//! This crate provides the Service Class User contract used to run
//! query/retrieve associations, together with the pieces every client
//! shares: connection objects, DIMSE status codes, the progress tracker and
//! data dictionary lookups.
//!
//! # Features
//! - Outbound DIMSE services (SCU): C-FIND, C-GET
//! - DCMTK command-line backend (feature = "dcmtk_cli", default)
//! - TLS certificate checks (optional, feature = "tls")

pub mod config;
pub mod dictionary;
pub mod error;
pub mod progress;
pub mod scu;
pub mod types;

#[cfg(feature = "dcmtk_cli")]
pub mod dcmtk;

#[cfg(feature = "tls")]
pub mod tls;

// Re-export commonly used types
pub use config::{AssociateRequest, Connection, TlsConfig, UserIdentity};
pub use error::{DimseError, Result};
pub use progress::{Progress, ProgressSnapshot};
pub use scu::{FindScu, GetScu, QueryRetrieveScu, ScuProvider};
pub use types::{
    status, DimseCommand, DimseStatus, FindModel, Priority, QueryLevel, QueryOption,
    RetrieveModel,
};

#[cfg(feature = "dcmtk_cli")]
pub use dcmtk::DcmtkProvider;
