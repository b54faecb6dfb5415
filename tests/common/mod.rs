#![allow(dead_code)]

//! Scripted in-process transport for the orchestrator tests

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use qrscu::{
    status, AssociateRequest, Connection, DicomNode, DimseError, FindModel, FindScu, GetScu,
    Priority, Progress, QueryLevel, QueryOption, QueryRetrieveScu, RetrieveModel, ScuProvider,
};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

type DimseResult<T> = std::result::Result<T, DimseError>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn nodes() -> (DicomNode, DicomNode) {
    (
        DicomNode::new("WORKSTATION"),
        DicomNode::with_address("ARCHIVE", "archive.local", 11112),
    )
}

#[derive(Debug, Clone, Copy)]
pub enum CloseFailure {
    Io,
    Interrupted,
}

/// What the mock transport does when driven
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_construct: bool,
    pub fail_open: Option<String>,
    /// Matches (find) or stored instances (get) reported before the request ends
    pub matches: u32,
    pub fail_execute: Option<String>,
    pub final_status: Option<u16>,
    pub error_comment: Option<String>,
    pub fail_close: Option<CloseFailure>,
    /// Pause between two reported matches
    pub pace: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub new_client: AtomicUsize,
    pub open: AtomicUsize,
    pub query: AtomicUsize,
    pub retrieve: AtomicUsize,
    pub close: AtomicUsize,
    pub cancel_after_set: AtomicUsize,
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Everything the orchestrator handed to the client
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub events: Vec<&'static str>,
    pub executor: Option<Handle>,
    pub scheduled: Option<Handle>,
    pub request: Option<AssociateRequest>,
    pub local: Option<Connection>,
    pub remote: Option<Connection>,
    pub priority: Option<Priority>,
    pub find_model: Option<FindModel>,
    pub retrieve_model: Option<RetrieveModel>,
    pub tsuid_order: Vec<String>,
    pub query_options: Vec<QueryOption>,
    pub relational: Option<bool>,
    pub levels: Vec<QueryLevel>,
    pub cancel_after: Option<u32>,
    pub keys: Option<InMemDicomObject>,
    pub get_keys: Vec<(Tag, Vec<String>)>,
    pub offered: Vec<(String, Vec<String>)>,
    pub storage_dir: Option<PathBuf>,
    pub worker_thread: Option<String>,
    pub progress: Option<Progress>,
}

#[derive(Clone)]
pub struct MockProvider {
    script: Script,
    counters: Arc<Counters>,
    captured: Arc<Mutex<Captured>>,
}

impl MockProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            counters: Arc::new(Counters::default()),
            captured: Arc::new(Mutex::new(Captured::default())),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn captured(&self) -> Captured {
        self.captured.lock().unwrap().clone()
    }

    fn client(&self, progress: Progress) -> DimseResult<MockScu> {
        self.counters.new_client.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_construct {
            return Err(DimseError::config("mock client unavailable"));
        }
        self.captured.lock().unwrap().progress = Some(progress.clone());
        Ok(MockScu {
            script: self.script.clone(),
            counters: self.counters.clone(),
            captured: self.captured.clone(),
            conn: Connection::default(),
            remote: Connection::default(),
            rq: AssociateRequest::default(),
            progress,
            keys: InMemDicomObject::new_empty(),
            executor: None,
            cancel_after: 0,
            storage_dir: None,
        })
    }
}

impl ScuProvider for MockProvider {
    fn new_find_scu(&self) -> DimseResult<Box<dyn FindScu>> {
        Ok(Box::new(self.client(Progress::new())?))
    }

    fn new_get_scu(&self, progress: Progress) -> DimseResult<Box<dyn GetScu>> {
        Ok(Box::new(self.client(progress)?))
    }
}

pub fn identifier(index: u32) -> InMemDicomObject {
    InMemDicomObject::from_element_iter([DataElement::new(
        tags::PATIENT_ID,
        VR::LO,
        PrimitiveValue::from(format!("PAT{:03}", index)),
    )])
}

struct MockScu {
    script: Script,
    counters: Arc<Counters>,
    captured: Arc<Mutex<Captured>>,
    conn: Connection,
    remote: Connection,
    rq: AssociateRequest,
    progress: Progress,
    keys: InMemDicomObject,
    executor: Option<Handle>,
    cancel_after: u32,
    storage_dir: Option<PathBuf>,
}

impl MockScu {
    fn record(&self, f: impl FnOnce(&mut Captured)) {
        f(&mut *self.captured.lock().unwrap());
    }

    fn executor(&self) -> DimseResult<Handle> {
        self.executor
            .clone()
            .ok_or_else(|| DimseError::internal("executor not set"))
    }

    /// Fail or settle the final status once the worker is done
    fn finish(&self) -> DimseResult<()> {
        if let Some(comment) = &self.script.error_comment {
            self.progress.set_error_comment(comment.clone());
        }
        if let Some(code) = self.script.final_status {
            self.progress.set_status(code);
        }
        if let Some(msg) = &self.script.fail_execute {
            return Err(DimseError::operation_failed(msg.clone()));
        }
        if self.progress.snapshot().is_unsettled() {
            self.progress.set_status(status::SUCCESS);
        }
        Ok(())
    }
}

#[async_trait]
impl QueryRetrieveScu for MockScu {
    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn remote_connection_mut(&mut self) -> &mut Connection {
        &mut self.remote
    }

    fn associate_request(&self) -> &AssociateRequest {
        &self.rq
    }

    fn associate_request_mut(&mut self) -> &mut AssociateRequest {
        &mut self.rq
    }

    fn set_priority(&mut self, priority: Priority) {
        self.record(|c| c.priority = Some(priority));
    }

    fn set_executor(&mut self, executor: Handle) {
        self.executor = Some(executor.clone());
        self.record(|c| c.executor = Some(executor));
    }

    fn set_scheduled_executor(&mut self, scheduled: Handle) {
        self.record(|c| c.scheduled = Some(scheduled));
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    async fn open(&mut self) -> DimseResult<()> {
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        let (rq, local, remote) = (self.rq.clone(), self.conn.clone(), self.remote.clone());
        self.record(|c| {
            c.events.push("open");
            c.request = Some(rq);
            c.local = Some(local);
            c.remote = Some(remote);
        });
        match &self.script.fail_open {
            Some(msg) => Err(DimseError::AssociationRejected(msg.clone())),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> DimseResult<()> {
        self.counters.close.fetch_add(1, Ordering::SeqCst);
        self.record(|c| c.events.push("close"));
        match self.script.fail_close {
            Some(CloseFailure::Io) => Err(DimseError::Network(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "socket closed by peer",
            ))),
            Some(CloseFailure::Interrupted) => {
                Err(DimseError::Interrupted("release interrupted".into()))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FindScu for MockScu {
    fn set_information_model(
        &mut self,
        model: FindModel,
        tsuid_order: &[String],
        options: &[QueryOption],
    ) {
        let (tsuids, options) = (tsuid_order.to_vec(), options.to_vec());
        self.record(|c| {
            c.find_model = Some(model);
            c.tsuid_order = tsuids;
            c.query_options = options;
        });
    }

    fn add_level(&mut self, level: QueryLevel) {
        self.record(|c| c.levels.push(level));
    }

    fn set_cancel_after(&mut self, matches: u32) {
        self.counters.cancel_after_set.fetch_add(1, Ordering::SeqCst);
        self.cancel_after = matches;
        self.record(|c| c.cancel_after = Some(matches));
    }

    fn keys_mut(&mut self) -> &mut InMemDicomObject {
        &mut self.keys
    }

    async fn query(&mut self) -> DimseResult<()> {
        self.counters.query.fetch_add(1, Ordering::SeqCst);
        let keys = self.keys.clone();
        self.record(|c| {
            c.events.push("query");
            c.keys = Some(keys);
        });

        let progress = self.progress.clone();
        let captured = self.captured.clone();
        let (matches, pace, cancel_after) = (self.script.matches, self.script.pace, self.cancel_after);
        self.executor()?
            .spawn(async move {
                let worker = std::thread::current().name().map(str::to_string);
                captured.lock().unwrap().worker_thread = worker;
                for i in 0..matches {
                    if cancel_after > 0 && i >= cancel_after {
                        progress.set_status(status::CANCEL);
                        break;
                    }
                    progress.match_received(Some(identifier(i)));
                    if let Some(pace) = pace {
                        tokio::time::sleep(pace).await;
                    }
                }
            })
            .await
            .map_err(|e| DimseError::internal(e.to_string()))?;

        self.finish()
    }
}

#[async_trait]
impl GetScu for MockScu {
    fn set_information_model(&mut self, model: RetrieveModel, tsuid_order: &[String], relational: bool) {
        let tsuids = tsuid_order.to_vec();
        self.record(|c| {
            c.retrieve_model = Some(model);
            c.tsuid_order = tsuids;
            c.relational = Some(relational);
        });
    }

    fn set_storage_directory(&mut self, dir: PathBuf) {
        self.storage_dir = Some(dir.clone());
        self.record(|c| c.storage_dir = Some(dir));
    }

    fn add_offered_storage_class(&mut self, class_uid: &str, transfer_syntaxes: &[String]) {
        let entry = (class_uid.to_string(), transfer_syntaxes.to_vec());
        self.record(|c| c.offered.push(entry));
    }

    fn add_key(&mut self, tag: Tag, values: &[String]) {
        let entry = (tag, values.to_vec());
        self.record(|c| c.get_keys.push(entry));
    }

    async fn retrieve(&mut self) -> DimseResult<()> {
        self.counters.retrieve.fetch_add(1, Ordering::SeqCst);
        self.record(|c| c.events.push("retrieve"));

        let dir = self
            .storage_dir
            .clone()
            .ok_or_else(|| DimseError::config("no storage directory"))?;
        let progress = self.progress.clone();
        let (total, pace) = (self.script.matches, self.script.pace);
        self.executor()?
            .spawn(async move {
                for i in 0..total {
                    let path = dir.join(format!("{:04}.dcm", i));
                    tokio::fs::write(&path, b"DICM").await?;
                    progress.set_suboperations(i + 1, 0, 0, total - i - 1);
                    progress.set_status(status::PENDING);
                    if let Some(pace) = pace {
                        tokio::time::sleep(pace).await;
                    }
                }
                Ok::<_, std::io::Error>(())
            })
            .await
            .map_err(|e| DimseError::internal(e.to_string()))??;

        self.finish()
    }
}
