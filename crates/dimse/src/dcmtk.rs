//! Query/retrieve clients backed by the DCMTK `findscu` and `getscu` tools
//!
//! DCMTK negotiates and releases its own association per invocation, so
//! `open` only verifies that the peer accepts TCP connections. Tool output
//! is parsed into the progress tracker on the executor worker while the
//! tool runs, and drained before `query`/`retrieve` return.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use dicom_core::value::Value;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::{TcpSocket, TcpStream};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AssociateRequest, Connection};
use crate::dictionary;
use crate::progress::Progress;
use crate::scu::{FindScu, GetScu, QueryRetrieveScu, ScuProvider};
use crate::types::{status, FindModel, Priority, QueryLevel, QueryOption, RetrieveModel};
use crate::{DimseError, Result};

/// Interval at which the storage directory is scanned during a C-GET
const STORAGE_SCAN_PERIOD: Duration = Duration::from_millis(250);

/// Creates DCMTK-backed clients
#[derive(Debug, Clone)]
pub struct DcmtkProvider {
    /// Path or name of the `findscu` executable
    pub findscu: PathBuf,
    /// Path or name of the `getscu` executable
    pub getscu: PathBuf,
}

impl Default for DcmtkProvider {
    fn default() -> Self {
        Self {
            findscu: PathBuf::from("findscu"),
            getscu: PathBuf::from("getscu"),
        }
    }
}

impl ScuProvider for DcmtkProvider {
    fn new_find_scu(&self) -> Result<Box<dyn FindScu>> {
        Ok(Box::new(DcmtkFindScu::new(self.findscu.clone())))
    }

    fn new_get_scu(&self, progress: Progress) -> Result<Box<dyn GetScu>> {
        Ok(Box::new(DcmtkGetScu::new(self.getscu.clone(), progress)))
    }
}

/// State common to both tools
struct Session {
    program: PathBuf,
    conn: Connection,
    remote: Connection,
    rq: AssociateRequest,
    priority: Priority,
    executor: Option<Handle>,
    scheduled: Option<Handle>,
    progress: Progress,
    opened: bool,
}

impl Session {
    fn new(program: PathBuf, progress: Progress) -> Self {
        Self {
            program,
            conn: Connection::default(),
            remote: Connection::default(),
            rq: AssociateRequest::default(),
            priority: Priority::default(),
            executor: None,
            scheduled: None,
            progress,
            opened: false,
        }
    }

    fn executor(&self) -> Handle {
        self.executor.clone().unwrap_or_else(Handle::current)
    }

    fn scheduled(&self) -> Handle {
        self.scheduled.clone().unwrap_or_else(Handle::current)
    }

    async fn open(&mut self) -> Result<()> {
        self.rq.validate()?;
        self.remote.validate_remote()?;

        if let Some(proxy) = &self.remote.proxy {
            return Err(DimseError::NotSupported(format!(
                "DCMTK tools cannot connect through proxy {}",
                proxy
            )));
        }
        if self.rq.user_identity.is_some() {
            warn!("User identity negotiation is not supported by DCMTK tools, ignoring it");
        }

        let host = self.remote.hostname.clone().unwrap_or_default();
        let port = self.remote.port;
        info!(
            "Opening association {} -> {}@{}:{}",
            self.rq.calling_aet, self.rq.called_aet, host, port
        );

        let probe = probe(self.conn.hostname.as_deref(), &host, port);
        let stream = match self.conn.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, probe).await.map_err(|_| {
                DimseError::Timeout(format!("connecting to {}:{} after {:?}", host, port, limit))
            })??,
            None => probe.await?,
        };
        stream.set_nodelay(self.conn.tcp_no_delay)?;
        drop(stream);

        self.opened = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.opened {
            debug!("Releasing association to {}", self.rq.called_aet);
        }
        self.opened = false;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.opened {
            return Err(DimseError::operation_failed("Association is not open"));
        }
        Ok(())
    }

    /// Arguments shared by both tools: AE titles, timeouts, PDU and TLS
    fn common_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-v".into(),
            "-aet".into(),
            self.rq.calling_aet.clone(),
            "-aec".into(),
            self.rq.called_aet.clone(),
        ];

        for (flag, ms) in [
            ("-to", self.conn.connect_timeout_ms),
            ("-ta", self.conn.acse_timeout_ms),
            ("-td", self.conn.dimse_timeout_ms),
        ] {
            if ms > 0 {
                args.push(flag.into());
                args.push(ms.div_ceil(1000).to_string());
            }
        }

        args.push("-pdu".into());
        args.push(self.conn.max_pdu_len_rcv.to_string());

        if let Some(tls) = &self.remote.tls {
            args.push("+tls".into());
            args.push(tls.key_path.to_string_lossy().to_string());
            args.push(tls.cert_path.to_string_lossy().to_string());
            match &tls.ca_bundle_path {
                Some(ca) => {
                    args.push("+cf".into());
                    args.push(ca.to_string_lossy().to_string());
                }
                None => args.push("-ic".into()),
            }
        }

        if self.priority != Priority::Medium {
            debug!("Priority {:?} is not forwarded by DCMTK tools", self.priority);
        }

        args
    }

    fn peer_args(&self) -> [String; 2] {
        [
            self.remote.hostname.clone().unwrap_or_default(),
            self.remote.port.to_string(),
        ]
    }

    /// Run the tool to completion, feeding its output into the tracker
    async fn run(&self, args: Vec<String>, count_matches: bool) -> Result<()> {
        let name = self.program.to_string_lossy().to_string();
        debug!("Running {} args: {:?}", name, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DimseError::operation_failed(format!("Failed to spawn {}: {}", name, e)))?;

        let executor = self.executor();
        let mut readers: Vec<JoinHandle<Vec<String>>> = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(executor.spawn(read_output(out, self.progress.clone(), count_matches)));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(executor.spawn(read_output(err, self.progress.clone(), count_matches)));
        }

        let exit = child.wait().await?;

        let mut errors = Vec::new();
        for reader in readers {
            match reader.await {
                Ok(lines) => errors.extend(lines),
                Err(e) => warn!("Output reader for {} stopped: {}", name, e),
            }
        }

        if exit.success() {
            if self.progress.snapshot().is_unsettled() {
                self.progress.set_status(status::SUCCESS);
            }
            info!("{} completed", name);
            Ok(())
        } else {
            let detail = errors
                .last()
                .cloned()
                .unwrap_or_else(|| "no diagnostic output".to_string());
            Err(DimseError::operation_failed(format!(
                "{} exited with {}: {}",
                name, exit, detail
            )))
        }
    }
}

/// C-FIND through `findscu`
pub struct DcmtkFindScu {
    session: Session,
    model: FindModel,
    tsuid_order: Vec<String>,
    options: Vec<QueryOption>,
    cancel_after: u32,
    keys: InMemDicomObject,
}

impl DcmtkFindScu {
    pub fn new(program: PathBuf) -> Self {
        Self {
            session: Session::new(program, Progress::new()),
            model: FindModel::default(),
            tsuid_order: Vec::new(),
            options: Vec::new(),
            cancel_after: 0,
            keys: InMemDicomObject::new_empty(),
        }
    }

    fn args(&self, out_dir: &Path) -> Vec<String> {
        let mut args = self.session.common_args();
        args.push(
            match self.model {
                FindModel::PatientRoot => "-P",
                FindModel::StudyRoot => "-S",
                FindModel::PatientStudyOnly => "-O",
                FindModel::Worklist => "-W",
            }
            .into(),
        );
        if let Some(flag) = transfer_syntax_flag(&self.tsuid_order) {
            args.push(flag.into());
        }
        if !self.options.is_empty() {
            debug!("Extended negotiation {:?} is not forwarded by findscu", self.options);
        }
        if self.cancel_after > 0 {
            args.push("--cancel".into());
            args.push(self.cancel_after.to_string());
        }
        args.push("-X".into());
        args.push("-od".into());
        args.push(out_dir.to_string_lossy().to_string());
        args.extend(key_args(&self.keys));
        args.extend(self.session.peer_args());
        args
    }
}

#[async_trait]
impl QueryRetrieveScu for DcmtkFindScu {
    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.session.conn
    }

    fn remote_connection_mut(&mut self) -> &mut Connection {
        &mut self.session.remote
    }

    fn associate_request(&self) -> &AssociateRequest {
        &self.session.rq
    }

    fn associate_request_mut(&mut self) -> &mut AssociateRequest {
        &mut self.session.rq
    }

    fn set_priority(&mut self, priority: Priority) {
        self.session.priority = priority;
    }

    fn set_executor(&mut self, executor: Handle) {
        self.session.executor = Some(executor);
    }

    fn set_scheduled_executor(&mut self, scheduled: Handle) {
        self.session.scheduled = Some(scheduled);
    }

    fn progress(&self) -> &Progress {
        &self.session.progress
    }

    async fn open(&mut self) -> Result<()> {
        self.session.open().await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }
}

#[async_trait]
impl FindScu for DcmtkFindScu {
    fn set_information_model(
        &mut self,
        model: FindModel,
        tsuid_order: &[String],
        options: &[QueryOption],
    ) {
        self.model = model;
        self.tsuid_order = tsuid_order.to_vec();
        self.options = options.to_vec();
    }

    fn add_level(&mut self, level: QueryLevel) {
        self.keys.put(DataElement::new(
            tags::QUERY_RETRIEVE_LEVEL,
            VR::CS,
            PrimitiveValue::from(level.to_string()),
        ));
    }

    fn set_cancel_after(&mut self, matches: u32) {
        self.cancel_after = matches;
    }

    fn keys_mut(&mut self) -> &mut InMemDicomObject {
        &mut self.keys
    }

    async fn query(&mut self) -> Result<()> {
        self.session.ensure_open()?;

        let out_dir = tempfile::tempdir()?;
        let outcome = self.session.run(self.args(out_dir.path()), true).await;

        for identifier in read_responses(out_dir.path()) {
            self.session.progress.push_response(identifier);
        }
        outcome
    }
}

/// C-GET through `getscu`
pub struct DcmtkGetScu {
    session: Session,
    model: RetrieveModel,
    tsuid_order: Vec<String>,
    relational: bool,
    storage_dir: Option<PathBuf>,
    storage_classes: Vec<(String, Vec<String>)>,
    keys: InMemDicomObject,
}

impl DcmtkGetScu {
    pub fn new(program: PathBuf, progress: Progress) -> Self {
        Self {
            session: Session::new(program, progress),
            model: RetrieveModel::default(),
            tsuid_order: Vec::new(),
            relational: false,
            storage_dir: None,
            storage_classes: Vec::new(),
            keys: InMemDicomObject::new_empty(),
        }
    }

    /// Storage classes offered so far, in registration order
    pub fn offered_storage_classes(&self) -> &[(String, Vec<String>)] {
        &self.storage_classes
    }

    /// getscu accepts every storage class it knows and takes a single
    /// transfer syntax preference for incoming stores. The preference is the
    /// syntax ranked first by most offered classes, ties going to the
    /// earliest class.
    fn storage_preference(&self) -> Option<&'static str> {
        let mut votes: Vec<(&str, usize)> = Vec::new();
        for (_, syntaxes) in &self.storage_classes {
            let Some(first) = syntaxes.first().filter(|ts| ts.as_str() != "*") else {
                continue;
            };
            match votes.iter_mut().find(|(ts, _)| *ts == first.as_str()) {
                Some((_, n)) => *n += 1,
                None => votes.push((first.as_str(), 1)),
            }
        }

        let mut preferred: Option<(&str, usize)> = None;
        for (ts, n) in votes {
            if preferred.map_or(true, |(_, best)| n > best) {
                preferred = Some((ts, n));
            }
        }
        let (ts, _) = preferred?;
        let flag = storage_syntax_flag(ts);
        if flag.is_none() {
            warn!("getscu cannot prefer transfer syntax {} for incoming objects", ts);
        }
        flag
    }

    fn args(&self, storage_dir: &Path) -> Result<Vec<String>> {
        let mut args = self.session.common_args();
        args.push(
            match self.model {
                RetrieveModel::PatientRoot => "-P",
                RetrieveModel::StudyRoot => "-S",
                RetrieveModel::PatientStudyOnly => "-O",
                other => {
                    return Err(DimseError::NotSupported(format!(
                        "getscu has no {:?} information model",
                        other
                    )))
                }
            }
            .into(),
        );
        if let Some(flag) = transfer_syntax_flag(&self.tsuid_order) {
            args.push(flag.into());
        }
        if let Some(flag) = self.storage_preference() {
            args.push(flag.into());
        }
        if self.relational {
            debug!("Relational retrieve is not forwarded by getscu");
        }
        args.push("-od".into());
        args.push(storage_dir.to_string_lossy().to_string());
        args.extend(key_args(&self.keys));
        args.extend(self.session.peer_args());
        Ok(args)
    }
}

#[async_trait]
impl QueryRetrieveScu for DcmtkGetScu {
    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.session.conn
    }

    fn remote_connection_mut(&mut self) -> &mut Connection {
        &mut self.session.remote
    }

    fn associate_request(&self) -> &AssociateRequest {
        &self.session.rq
    }

    fn associate_request_mut(&mut self) -> &mut AssociateRequest {
        &mut self.session.rq
    }

    fn set_priority(&mut self, priority: Priority) {
        self.session.priority = priority;
    }

    fn set_executor(&mut self, executor: Handle) {
        self.session.executor = Some(executor);
    }

    fn set_scheduled_executor(&mut self, scheduled: Handle) {
        self.session.scheduled = Some(scheduled);
    }

    fn progress(&self) -> &Progress {
        &self.session.progress
    }

    async fn open(&mut self) -> Result<()> {
        self.session.open().await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }
}

#[async_trait]
impl GetScu for DcmtkGetScu {
    fn set_information_model(&mut self, model: RetrieveModel, tsuid_order: &[String], relational: bool) {
        self.model = model;
        self.tsuid_order = tsuid_order.to_vec();
        self.relational = relational;
    }

    fn set_storage_directory(&mut self, dir: PathBuf) {
        self.storage_dir = Some(dir);
    }

    fn add_offered_storage_class(&mut self, class_uid: &str, transfer_syntaxes: &[String]) {
        self.storage_classes
            .push((class_uid.to_string(), transfer_syntaxes.to_vec()));
    }

    fn add_key(&mut self, tag: Tag, values: &[String]) {
        let vr = dictionary::vr_of(tag, None);
        if values.is_empty() {
            self.keys.put(DataElement::empty(tag, vr));
        } else {
            self.keys.put(DataElement::new(
                tag,
                vr,
                PrimitiveValue::Strs(values.iter().cloned().collect()),
            ));
        }
    }

    async fn retrieve(&mut self) -> Result<()> {
        self.session.ensure_open()?;

        let dir = self
            .storage_dir
            .clone()
            .ok_or_else(|| DimseError::config("No storage directory set"))?;
        tokio::fs::create_dir_all(&dir).await?;
        let args = self.args(&dir)?;
        if !self.storage_classes.is_empty() {
            info!(
                "getscu negotiates its own storage classes, {} offered classes only set the preferred transfer syntax",
                self.storage_classes.len()
            );
        }
        debug!("Storing into {}", dir.display());

        let baseline = count_files(&dir);
        let progress = self.session.progress.clone();
        let scan_dir = dir.clone();
        let scanner = self.session.scheduled().spawn(async move {
            let mut ticker = tokio::time::interval(STORAGE_SCAN_PERIOD);
            loop {
                ticker.tick().await;
                let stored = count_files(&scan_dir).saturating_sub(baseline) as u32;
                progress.update(|s| s.completed_suboperations = stored);
            }
        });

        let outcome = self.session.run(args, false).await;
        scanner.abort();

        let stored = count_files(&dir).saturating_sub(baseline) as u32;
        self.session.progress.update(|s| {
            s.completed_suboperations = stored;
            if outcome.is_ok() {
                s.remaining_suboperations = 0;
            }
        });
        outcome
    }
}

/// Open and drop a TCP connection to check that the peer is reachable
async fn probe(bind_host: Option<&str>, host: &str, port: u16) -> Result<TcpStream> {
    let Some(bind_host) = bind_host else {
        return Ok(TcpStream::connect((host, port)).await?);
    };

    let remote = tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| DimseError::config(format!("Cannot resolve {}", host)))?;
    let local = tokio::net::lookup_host((bind_host, 0))
        .await?
        .find(|addr| addr.is_ipv4() == remote.is_ipv4())
        .ok_or_else(|| DimseError::config(format!("Cannot bind to {}", bind_host)))?;

    let socket = if remote.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(local)?;
    Ok(socket.connect(remote).await?)
}

/// DCMTK network transfer syntax preference for the first entry of the order
fn transfer_syntax_flag(order: &[String]) -> Option<&'static str> {
    match order.first().map(String::as_str) {
        Some(uids::EXPLICIT_VR_LITTLE_ENDIAN) => Some("-xe"),
        Some(uids::EXPLICIT_VR_BIG_ENDIAN) => Some("-xb"),
        _ => None,
    }
}

/// getscu preference for the transfer syntax of incoming C-STOREs
fn storage_syntax_flag(ts: &str) -> Option<&'static str> {
    let flag = match ts {
        uids::IMPLICIT_VR_LITTLE_ENDIAN => "+xi",
        uids::EXPLICIT_VR_LITTLE_ENDIAN => "+xe",
        uids::EXPLICIT_VR_BIG_ENDIAN => "+xb",
        uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => "+xd",
        uids::JPEG_LOSSLESS_SV1 => "+xs",
        uids::JPEG_BASELINE8_BIT => "+xy",
        uids::JPEG_EXTENDED12_BIT => "+xx",
        uids::JPEG2000_LOSSLESS => "+xv",
        uids::JPEG2000 => "+xw",
        uids::JPEGLS_LOSSLESS => "+xt",
        uids::JPEGLS_NEAR_LOSSLESS => "+xu",
        uids::RLE_LOSSLESS => "+xr",
        _ => return None,
    };
    Some(flag)
}

/// `-k` arguments for every element of the identifier
fn key_args(keys: &InMemDicomObject) -> Vec<String> {
    let mut args = Vec::new();
    for elem in keys {
        let tag = elem.header().tag;
        let path = format!("({:04X},{:04X})", tag.group(), tag.element());
        let key = match elem.value() {
            Value::Primitive(PrimitiveValue::Empty) | Value::Sequence(_) => path,
            Value::Primitive(_) => match elem.to_multi_str() {
                Ok(values) => format!("{}={}", path, values.join("\\")),
                Err(_) => path,
            },
            Value::PixelSequence(_) => continue,
        };
        args.push("-k".into());
        args.push(key);
    }
    args
}

async fn read_output<R>(reader: R, progress: Progress, count_matches: bool) -> Vec<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let mut errors = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("{}", line);
        apply_output_line(&line, &progress, count_matches);
        if line.starts_with("E:") || line.starts_with("F:") {
            errors.push(line);
        }
    }
    errors
}

/// Update the tracker from one line of DCMTK verbose output
fn apply_output_line(line: &str, progress: &Progress, count_matches: bool) {
    let lower = line.to_ascii_lowercase();

    if count_matches && lower.contains("find response") && lower.contains("(pending") {
        progress.match_received(None);
        return;
    }

    if lower.contains("response") || lower.contains("status") {
        if let Some(code) = parse_status(&lower) {
            progress.set_status(code);
        }
    }

    if let Some(idx) = lower.find("error comment") {
        let comment = line[idx + "error comment".len()..]
            .trim_start_matches([':', ' '])
            .trim();
        if !comment.is_empty() {
            progress.set_error_comment(comment);
        }
    }
}

/// Status from either a `0xNNNN` code or a `(Success)`-style keyword
fn parse_status(lower: &str) -> Option<u16> {
    if let Some(idx) = lower.find("0x") {
        let hex: String = lower[idx + 2..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        if hex.len() == 4 {
            return u16::from_str_radix(&hex, 16).ok();
        }
    }

    if lower.contains("(success") {
        Some(status::SUCCESS)
    } else if lower.contains("(cancel") {
        Some(status::CANCEL)
    } else if lower.contains("(pending") {
        Some(status::PENDING)
    } else {
        None
    }
}

/// Identifiers extracted by `findscu -X`, in response order
fn read_responses(dir: &Path) -> Vec<InMemDicomObject> {
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(rd) => rd
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("dcm"))
            .collect(),
        Err(e) => {
            warn!("Cannot read responses from {:?}: {}", dir, e);
            return Vec::new();
        }
    };
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| match dicom_object::open_file(&path) {
            Ok(obj) => Some(obj.into_inner()),
            Err(e) => {
                warn!("Skipping unreadable response {:?}: {}", path, e);
                None
            }
        })
        .collect()
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|entry| entry.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}
