//! Service Class User contract for outbound query/retrieve associations
//!
//! The orchestrating code only talks to the traits in this module. A client
//! is configured through its connection objects, then driven through
//! `open`, `query`/`retrieve` and `close`. Progress is reported into the
//! client's [`Progress`] tracker, possibly from the executor worker.

use std::path::PathBuf;

use async_trait::async_trait;
use dicom_core::Tag;
use dicom_object::InMemDicomObject;
use tokio::runtime::Handle;

use crate::config::{AssociateRequest, Connection};
use crate::progress::Progress;
use crate::types::{FindModel, Priority, QueryLevel, QueryOption, RetrieveModel};
use crate::Result;

/// Lifecycle and connection settings shared by every SCU
#[async_trait]
pub trait QueryRetrieveScu: Send {
    /// Local connection (bind side)
    fn connection_mut(&mut self) -> &mut Connection;

    /// Remote connection (peer side)
    fn remote_connection_mut(&mut self) -> &mut Connection;

    fn associate_request(&self) -> &AssociateRequest;

    fn associate_request_mut(&mut self) -> &mut AssociateRequest;

    fn set_priority(&mut self, priority: Priority);

    /// Worker used for immediate tasks such as response delivery
    fn set_executor(&mut self, executor: Handle);

    /// Worker used for delayed and periodic tasks
    fn set_scheduled_executor(&mut self, scheduled: Handle);

    /// Tracker updated while the association runs
    fn progress(&self) -> &Progress;

    /// Open the association
    async fn open(&mut self) -> Result<()>;

    /// Release the association and wait for outstanding callbacks
    async fn close(&mut self) -> Result<()>;
}

/// C-FIND client
#[async_trait]
pub trait FindScu: QueryRetrieveScu {
    fn set_information_model(
        &mut self,
        model: FindModel,
        tsuid_order: &[String],
        options: &[QueryOption],
    );

    /// Add the Query/Retrieve Level (0008,0052) to the identifier
    fn add_level(&mut self, level: QueryLevel);

    /// Cancel the query after this many matches, 0 disables
    fn set_cancel_after(&mut self, matches: u32);

    /// Identifier sent with the C-FIND request
    fn keys_mut(&mut self) -> &mut InMemDicomObject;

    async fn query(&mut self) -> Result<()>;
}

/// C-GET client storing retrieved instances into a directory
#[async_trait]
pub trait GetScu: QueryRetrieveScu {
    fn set_information_model(&mut self, model: RetrieveModel, tsuid_order: &[String], relational: bool);

    fn set_storage_directory(&mut self, dir: PathBuf);

    /// Offer a storage presentation context for instances sent back by the peer
    fn add_offered_storage_class(&mut self, class_uid: &str, transfer_syntaxes: &[String]);

    /// Add a matching key (with values) or a returning key (empty) to the identifier
    fn add_key(&mut self, tag: Tag, values: &[String]);

    async fn retrieve(&mut self) -> Result<()>;
}

/// Factory for fresh clients, one per operation
pub trait ScuProvider: Send + Sync {
    fn new_find_scu(&self) -> Result<Box<dyn FindScu>>;

    /// Create a C-GET client reporting into a caller-owned tracker
    fn new_get_scu(&self, progress: Progress) -> Result<Box<dyn GetScu>>;
}
