//! C-GET from a single called node into a local directory

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use dimse::{DimseCommand, GetScu, Progress, ScuProvider};
use tracing::{debug, error};

use super::{configure_client, off_runtime, run_association, Schedulers};
use crate::error::{OpError, Result};
use crate::param::{AdvancedParams, AttributeKey, DicomNode};
use crate::state::OperationResult;
use crate::storage_classes::StorageClassTable;

/// Builder for a [`GetRequest`]
#[derive(Debug, Clone, Default)]
pub struct GetBuilder {
    params: Option<AdvancedParams>,
    calling: Option<DicomNode>,
    called: Option<DicomNode>,
    progress: Option<Progress>,
    output_dir: Option<PathBuf>,
    storage_classes: Option<StorageClassTable>,
    keys: Vec<AttributeKey>,
}

impl GetBuilder {
    pub fn params(mut self, params: AdvancedParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn calling_node(mut self, node: DicomNode) -> Self {
        self.calling = Some(node);
        self
    }

    pub fn called_node(mut self, node: DicomNode) -> Self {
        self.called = Some(node);
        self
    }

    /// Tracker the transport reports into; a private one is created otherwise
    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Directory receiving the retrieved instances
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Accepted storage classes, the bundled table when not set
    pub fn storage_classes(mut self, table: StorageClassTable) -> Self {
        self.storage_classes = Some(table);
        self
    }

    pub fn key(mut self, key: AttributeKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn keys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = AttributeKey>,
    {
        self.keys.extend(keys);
        self
    }

    pub fn build(self) -> Result<GetRequest> {
        let calling = self
            .calling
            .ok_or_else(|| OpError::invalid_argument("calling node is required"))?;
        let called = self
            .called
            .ok_or_else(|| OpError::invalid_argument("called node is required"))?;
        let output_dir = self
            .output_dir
            .ok_or_else(|| OpError::invalid_argument("output directory is required"))?;

        Ok(GetRequest {
            params: self.params.unwrap_or_default(),
            calling,
            called,
            progress: self.progress.unwrap_or_default(),
            output_dir,
            storage_classes: self.storage_classes,
            keys: self.keys,
        })
    }
}

/// A validated C-GET request
#[derive(Debug, Clone)]
pub struct GetRequest {
    params: AdvancedParams,
    calling: DicomNode,
    called: DicomNode,
    progress: Progress,
    output_dir: PathBuf,
    storage_classes: Option<StorageClassTable>,
    keys: Vec<AttributeKey>,
}

impl GetRequest {
    pub fn builder() -> GetBuilder {
        GetBuilder::default()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run the retrieve through the DCMTK `getscu` tool.
    ///
    /// Blocks the calling thread until the association is gone. From within
    /// an async runtime the operation moves to a dedicated thread, so prefer
    /// `spawn_blocking` there to keep the runtime's worker free.
    #[cfg(feature = "dcmtk_cli")]
    pub fn process(&self) -> OperationResult {
        self.process_with(&dimse::DcmtkProvider::default())
    }

    /// Run the retrieve with clients from `provider`
    pub fn process_with<P>(&self, provider: &P) -> OperationResult
    where
        P: ScuProvider + ?Sized,
    {
        off_runtime(|| self.run(provider))
    }

    fn run<P>(&self, provider: &P) -> OperationResult
    where
        P: ScuProvider + ?Sized,
    {
        let (mut client, schedulers) = match self.prepare(provider) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("getscu: {}", e);
                return OperationResult::unable_to_process(
                    "DICOM Get failed",
                    e,
                    Some(self.progress.clone()),
                );
            }
        };

        debug!(
            "C-Get {} -> {} into {}",
            self.calling,
            self.called,
            self.output_dir.display()
        );
        run_association(client.as_mut(), schedulers, DimseCommand::Get, |scu| {
            scu.retrieve()
        })
    }

    fn prepare<P>(&self, provider: &P) -> Result<(Box<dyn GetScu>, Schedulers)>
    where
        P: ScuProvider + ?Sized,
    {
        let params = &self.params;
        let mut scu = provider.new_get_scu(self.progress.clone())?;

        configure_client(scu.as_mut(), params, &self.calling, &self.called)?;
        scu.set_priority(params.priority);
        scu.set_storage_directory(self.output_dir.clone());
        scu.set_information_model(
            params.resolved_retrieve_model(),
            &params.tsuid_order,
            params.is_relational(),
        );
        offer_storage_classes(scu.as_mut(), self.storage_classes.as_ref());

        for key in &self.keys {
            scu.add_key(key.tag(), key.values());
        }

        let schedulers = Schedulers::new("getscu").map_err(dimse::DimseError::from)?;
        scu.set_executor(schedulers.executor());
        scu.set_scheduled_executor(schedulers.scheduled());
        Ok((scu, schedulers))
    }
}

/// Register every storage class that resolves; a broken table is logged
/// and the classes read before the failure are still offered.
fn offer_storage_classes(scu: &mut dyn GetScu, source: Option<&StorageClassTable>) {
    let table = match source {
        Some(table) => Cow::Borrowed(table),
        None => match StorageClassTable::bundled() {
            Ok(table) => Cow::Owned(table),
            Err(e) => {
                error!("Read storage classes: {}", e);
                return;
            }
        },
    };

    let (resolved, failure) = table.resolve();
    for entry in &resolved {
        scu.add_offered_storage_class(&entry.class_uid, &entry.transfer_syntaxes);
    }
    if let Some(e) = failure {
        error!("Read storage classes: {}", e);
    }
    debug!("Offering {} storage classes", resolved.len());
}

/// Retrieve into `output_dir` with default settings
#[cfg(feature = "dcmtk_cli")]
pub fn get(
    calling: &DicomNode,
    called: &DicomNode,
    progress: &Progress,
    output_dir: &Path,
    keys: &[AttributeKey],
) -> OperationResult {
    run_get(GetRequest::builder(), calling, called, progress, output_dir, keys)
}

/// Retrieve into `output_dir` with explicit settings
#[cfg(feature = "dcmtk_cli")]
pub fn get_with(
    params: &AdvancedParams,
    calling: &DicomNode,
    called: &DicomNode,
    progress: &Progress,
    output_dir: &Path,
    keys: &[AttributeKey],
) -> OperationResult {
    run_get(
        GetRequest::builder().params(params.clone()),
        calling,
        called,
        progress,
        output_dir,
        keys,
    )
}

#[cfg(feature = "dcmtk_cli")]
fn run_get(
    builder: GetBuilder,
    calling: &DicomNode,
    called: &DicomNode,
    progress: &Progress,
    output_dir: &Path,
    keys: &[AttributeKey],
) -> OperationResult {
    let built = builder
        .calling_node(calling.clone())
        .called_node(called.clone())
        .progress(progress.clone())
        .output_dir(output_dir)
        .keys(keys.iter().cloned())
        .build();
    match built {
        Ok(request) => request.process(),
        Err(e) => OperationResult::unable_to_process("DICOM Get failed", e, Some(progress.clone())),
    }
}
