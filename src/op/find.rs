//! C-FIND against a single called node

use dimse::{DimseCommand, FindScu, QueryLevel, ScuProvider};
use tracing::{debug, error};

use super::{configure_client, off_runtime, request::add_attributes, run_association, Schedulers};
use crate::error::{OpError, Result};
use crate::param::{AdvancedParams, AttributeKey, DicomNode};
use crate::state::OperationResult;

/// Builder for a [`FindRequest`]
#[derive(Debug, Clone)]
pub struct FindBuilder {
    params: Option<AdvancedParams>,
    calling: Option<DicomNode>,
    called: Option<DicomNode>,
    cancel_after: u32,
    level: Option<QueryLevel>,
    keys: Vec<AttributeKey>,
}

impl Default for FindBuilder {
    fn default() -> Self {
        Self {
            params: None,
            calling: None,
            called: None,
            cancel_after: 0,
            level: Some(QueryLevel::Study),
            keys: Vec::new(),
        }
    }
}

impl FindBuilder {
    /// Advanced settings, defaults when not set
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

    /// Cancel the query after this many matches, 0 disables
    pub fn cancel_after(mut self, matches: u32) -> Self {
        self.cancel_after = matches;
        self
    }

    /// Query/Retrieve Level added to the identifier, `None` leaves it out
    pub fn level(mut self, level: Option<QueryLevel>) -> Self {
        self.level = level;
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

    pub fn build(self) -> Result<FindRequest> {
        let calling = self
            .calling
            .ok_or_else(|| OpError::invalid_argument("calling node is required"))?;
        let called = self
            .called
            .ok_or_else(|| OpError::invalid_argument("called node is required"))?;

        Ok(FindRequest {
            params: self.params.unwrap_or_default(),
            calling,
            called,
            cancel_after: self.cancel_after,
            level: self.level,
            keys: self.keys,
        })
    }
}

/// A validated C-FIND request, reusable across calls
#[derive(Debug, Clone)]
pub struct FindRequest {
    params: AdvancedParams,
    calling: DicomNode,
    called: DicomNode,
    cancel_after: u32,
    level: Option<QueryLevel>,
    keys: Vec<AttributeKey>,
}

impl FindRequest {
    pub fn builder() -> FindBuilder {
        FindBuilder::default()
    }

    pub fn calling(&self) -> &DicomNode {
        &self.calling
    }

    pub fn called(&self) -> &DicomNode {
        &self.called
    }

    /// Run the query through the DCMTK `findscu` tool.
    ///
    /// Blocks the calling thread until the association is gone. From within
    /// an async runtime the operation moves to a dedicated thread, so prefer
    /// `spawn_blocking` there to keep the runtime's worker free.
    #[cfg(feature = "dcmtk_cli")]
    pub fn process(&self) -> OperationResult {
        self.process_with(&dimse::DcmtkProvider::default())
    }

    /// Run the query with clients from `provider`
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
                error!("findscu: {}", e);
                return OperationResult::unable_to_process("DICOM Find failed", e, None);
            }
        };

        debug!("C-Find {} -> {}", self.calling, self.called);
        run_association(client.as_mut(), schedulers, DimseCommand::Find, |scu| scu.query())
    }

    fn prepare<P>(&self, provider: &P) -> Result<(Box<dyn FindScu>, Schedulers)>
    where
        P: ScuProvider + ?Sized,
    {
        let params = &self.params;
        let mut scu = provider.new_find_scu()?;

        configure_client(scu.as_mut(), params, &self.calling, &self.called)?;
        scu.set_information_model(
            params.resolved_find_model(),
            &params.tsuid_order,
            &params.query_options(),
        );
        if let Some(level) = self.level {
            scu.add_level(level);
        }
        for key in &self.keys {
            add_attributes(scu.keys_mut(), key);
        }
        scu.set_cancel_after(self.cancel_after);
        scu.set_priority(params.priority);

        let schedulers = Schedulers::new("findscu").map_err(dimse::DimseError::from)?;
        scu.set_executor(schedulers.executor());
        scu.set_scheduled_executor(schedulers.scheduled());
        Ok((scu, schedulers))
    }
}

/// Query `called` at study level with default settings
#[cfg(feature = "dcmtk_cli")]
pub fn find(calling: &DicomNode, called: &DicomNode, keys: &[AttributeKey]) -> OperationResult {
    run_find(FindRequest::builder(), calling, called, keys)
}

/// Query `called` at study level with explicit settings
#[cfg(feature = "dcmtk_cli")]
pub fn find_with(
    params: &AdvancedParams,
    calling: &DicomNode,
    called: &DicomNode,
    keys: &[AttributeKey],
) -> OperationResult {
    run_find(FindRequest::builder().params(params.clone()), calling, called, keys)
}

#[cfg(feature = "dcmtk_cli")]
fn run_find(
    builder: FindBuilder,
    calling: &DicomNode,
    called: &DicomNode,
    keys: &[AttributeKey],
) -> OperationResult {
    let built = builder
        .calling_node(calling.clone())
        .called_node(called.clone())
        .keys(keys.iter().cloned())
        .build();
    match built {
        Ok(request) => request.process(),
        Err(e) => OperationResult::unable_to_process("DICOM Find failed", e, None),
    }
}
