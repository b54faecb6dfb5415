use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use qrscu::{keys, status, DicomNode, FindRequest, GetRequest, Progress, QueryLevel};

const SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";

struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn tools_present() -> bool {
    for bin in ["dcmqrscp", "storescu", "findscu", "getscu"] {
        if Command::new(bin).arg("--version").output().is_err() {
            eprintln!("Skipping dcmqrscp test: {} not found", bin);
            return false;
        }
    }
    true
}

fn verbose() -> bool {
    std::env::var("QRSCU_TEST_VERBOSE_DCMTK").ok().as_deref() == Some("1")
}

fn quiet(cmd: &mut Command) -> &mut Command {
    if !verbose() {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    cmd
}

fn uid(suffix: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    format!(
        "1.2.826.0.1.3680043.10.5432.{}.{}.{}",
        suffix,
        now.as_secs(),
        now.subsec_nanos()
    )
}

fn write_seed(path: &Path, study_uid: &str) {
    let sop_uid = uid("1");
    let obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(SECONDARY_CAPTURE)),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(sop_uid.as_str())),
        DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from(study_uid)),
        DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from(uid("3"))),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("OT")),
        DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("TEST123")),
        DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("DOE^FIND")),
    ]);
    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .media_storage_sop_class_uid(SECONDARY_CAPTURE)
                .media_storage_sop_instance_uid(sop_uid)
                .transfer_syntax("1.2.840.10008.1.2.1"),
        )
        .expect("file meta");
    file.write_to_file(path).expect("write seed");
}

#[test]
fn find_and_get_against_dcmqrscp() {
    if !tools_present() {
        return;
    }

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let base = tempfile::tempdir().unwrap();
    let dbdir = base.path().join("qrdb");
    std::fs::create_dir_all(&dbdir).unwrap();
    let cfg_path = base.path().join("dcmqrscp.cfg");
    let cfg = format!(
        "MaxPDUSize = 16384\nMaxAssociations = 16\n\nHostTable BEGIN\nHostTable END\n\nVendorTable BEGIN\nVendorTable END\n\nAETable BEGIN\nQR_SCP  {db}  RW  (9, 1024mb)  ANY\nAETable END\n",
        db = dbdir.display()
    );
    std::fs::write(&cfg_path, cfg).unwrap();

    let mut qr = Command::new("dcmqrscp");
    if verbose() {
        qr.arg("-d");
    }
    let child = quiet(qr.arg("-c").arg(&cfg_path).arg(port.to_string()))
        .spawn()
        .expect("spawn dcmqrscp");
    let _qr = KillOnDrop(child);

    for _ in 0..60 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let study_uid = uid("2");
    let seed = base.path().join("seed.dcm");
    write_seed(&seed, &study_uid);

    let stored = quiet(
        Command::new("storescu")
            .arg("--aetitle")
            .arg("QRSCU")
            .arg("--call")
            .arg("QR_SCP")
            .arg("127.0.0.1")
            .arg(port.to_string())
            .arg(&seed),
    )
    .status()
    .expect("run storescu");
    if !stored.success() {
        eprintln!("storescu failed; skipping assertions");
        return;
    }

    let calling = DicomNode::new("QRSCU");
    let called = DicomNode::with_address("QR_SCP", "127.0.0.1", port);

    let found = FindRequest::builder()
        .calling_node(calling.clone())
        .called_node(called.clone())
        .level(Some(QueryLevel::Study))
        .key(keys::PATIENT_ID.with_values(["TEST123"]))
        .key(keys::STUDY_INSTANCE_UID)
        .build()
        .unwrap()
        .process();

    assert_eq!(found.status(), status::SUCCESS, "{:?}", found.message());
    assert_eq!(found.snapshot().matches_received, 1);
    let responses = found.responses();
    if let Some(identifier) = responses.first() {
        let returned = identifier.element(tags::STUDY_INSTANCE_UID).unwrap();
        assert_eq!(returned.to_str().unwrap().trim_end_matches('\0'), study_uid);
    }

    let out = tempfile::tempdir().unwrap();
    let progress = Progress::new();
    let retrieved = GetRequest::builder()
        .calling_node(calling)
        .called_node(called)
        .progress(progress.clone())
        .output_dir(out.path())
        .key(keys::QUERY_RETRIEVE_LEVEL.with_values(["STUDY"]))
        .key(keys::STUDY_INSTANCE_UID.with_values([study_uid.as_str()]))
        .build()
        .unwrap()
        .process();

    assert!(retrieved.is_success(), "{:?}", retrieved.message());
    assert_eq!(progress.snapshot().completed_suboperations, 1);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
}
