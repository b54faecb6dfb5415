//! C-FIND and C-GET service-class-user operations
//!
//! Each operation runs one association against a remote DICOM node from
//! start to finish on the calling thread: the client is configured from the
//! calling/called nodes and [`AdvancedParams`], the association is opened,
//! the request runs, and the association is always released before an
//! [`OperationResult`] is returned. Failures never escape as errors; they are
//! reported through the result's status and error detail.
//!
//! ```no_run
//! use qrscu::{keys, DicomNode, FindRequest, QueryLevel};
//!
//! let result = FindRequest::builder()
//!     .calling_node(DicomNode::new("WORKSTATION"))
//!     .called_node(DicomNode::with_address("PACS", "pacs.local", 11112))
//!     .level(Some(QueryLevel::Study))
//!     .key(keys::PATIENT_ID.with_values(["12345"]))
//!     .key(keys::STUDY_INSTANCE_UID)
//!     .build()?
//!     .process();
//!
//! for identifier in result.responses() {
//!     println!("{:?}", identifier);
//! }
//! # Ok::<(), qrscu::OpError>(())
//! ```

pub mod error;
pub mod op;
pub mod param;
pub mod state;
pub mod storage_classes;

pub use error::{ConfigError, OpError, Result};
pub use op::{add_attributes, FindBuilder, FindRequest, GetBuilder, GetRequest};
#[cfg(feature = "dcmtk_cli")]
pub use op::{find, find_with, get, get_with};
pub use param::{keys, AdvancedParams, AttributeKey, ConnectOptions, DicomNode, IVR_LE_FIRST};
pub use state::OperationResult;
pub use storage_classes::{OfferedStorageClass, StorageClassTable};

pub use dimse::{
    status, AssociateRequest, Connection, DimseError, DimseStatus, FindModel, FindScu, GetScu,
    Priority, Progress, ProgressSnapshot, QueryLevel, QueryOption, QueryRetrieveScu,
    RetrieveModel, ScuProvider, TlsConfig, UserIdentity,
};
#[cfg(feature = "dcmtk_cli")]
pub use dimse::DcmtkProvider;
