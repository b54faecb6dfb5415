use qrscu::{
    keys, status, AdvancedParams, ConnectOptions, DicomNode, DimseError, FindRequest,
    GetRequest, OpError,
};

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn params() -> AdvancedParams {
    AdvancedParams {
        connect: ConnectOptions {
            connect_timeout_ms: 2000,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn find_against_closed_port_fails_cleanly() {
    let port = closed_port();
    let result = FindRequest::builder()
        .params(params())
        .calling_node(DicomNode::new("QRSCU"))
        .called_node(DicomNode::with_address("NOBODY", "127.0.0.1", port))
        .key(keys::PATIENT_ID)
        .build()
        .unwrap()
        .process();

    assert_eq!(result.status(), status::UNABLE_TO_PROCESS);
    assert!(matches!(
        result.error().and_then(OpError::as_dimse),
        Some(DimseError::Network(_))
    ));
    assert!(result.snapshot().completed);
    assert_eq!(result.snapshot().matches_received, 0);
}

#[test]
fn get_against_closed_port_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let port = closed_port();
    let result = GetRequest::builder()
        .params(params())
        .calling_node(DicomNode::new("QRSCU"))
        .called_node(DicomNode::with_address("NOBODY", "127.0.0.1", port))
        .output_dir(dir.path())
        .key(keys::STUDY_INSTANCE_UID.with_values(["1.2.3"]))
        .build()
        .unwrap()
        .process();

    assert_eq!(result.status(), status::UNABLE_TO_PROCESS);
    assert!(result.error().is_some());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn convenience_find_with_rejects_bad_ae_title() {
    let port = closed_port();
    let result = qrscu::find_with(
        &params(),
        &DicomNode::new("A\\B"),
        &DicomNode::with_address("NOBODY", "127.0.0.1", port),
        &[keys::PATIENT_ID],
    );

    assert_eq!(result.status(), status::UNABLE_TO_PROCESS);
    assert!(matches!(
        result.error().and_then(OpError::as_dimse),
        Some(DimseError::InvalidAeTitle(_))
    ));
}
