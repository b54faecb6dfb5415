use qrscu::{AdvancedParams, ConfigError, FindModel, Priority, QueryOption, RetrieveModel};

#[test]
fn test_empty_document_gives_defaults() {
    let params = AdvancedParams::from_toml_str("").unwrap();

    assert_eq!(params.find_model, None);
    assert_eq!(params.resolved_find_model(), FindModel::StudyRoot);
    assert_eq!(params.resolved_retrieve_model(), RetrieveModel::StudyRoot);
    assert_eq!(params.priority, Priority::Medium);
    assert_eq!(params.tsuid_order, qrscu::IVR_LE_FIRST.to_vec());
    assert!(params.query_options.is_empty());
    assert!(params.connect.tcp_no_delay);
}

#[test]
fn test_full_document() {
    let toml = r#"
        find_model = "patient-root"
        retrieve_model = "composite-instance-root"
        query_options = ["relational", "fuzzy"]
        tsuid_order = ["1.2.840.10008.1.2.1"]
        priority = "high"

        [identity]
        username = "radiology"
        password = "secret"
        positive_response_requested = true

        [connect]
        max_pdu_len_rcv = 65536
        connect_timeout_ms = 5000
        dimse_timeout_ms = 30000
        tcp_no_delay = false
    "#;

    let params = AdvancedParams::from_toml_str(toml).unwrap();

    assert_eq!(params.resolved_find_model(), FindModel::PatientRoot);
    assert_eq!(
        params.resolved_retrieve_model(),
        RetrieveModel::CompositeInstanceRoot
    );
    assert_eq!(
        params.query_options(),
        vec![QueryOption::Relational, QueryOption::Fuzzy]
    );
    assert!(params.is_relational());
    assert_eq!(params.priority, Priority::High);
    assert_eq!(params.identity.as_ref().unwrap().username, "radiology");
    assert_eq!(params.connect.max_pdu_len_rcv, 65536);
    assert_eq!(params.connect.max_pdu_len_snd, 16378);
    assert_eq!(params.connect.connect_timeout_ms, 5000);
    assert_eq!(params.connect.acse_timeout_ms, 0);
    assert!(!params.connect.tcp_no_delay);
}

#[test]
fn test_resolved_model_is_idempotent() {
    let params = AdvancedParams::default();
    assert_eq!(params.resolved_find_model(), params.resolved_find_model());
    assert_eq!(params.find_model, None);
}

#[test]
fn test_invalid_documents() {
    let err = AdvancedParams::from_toml_str("tsuid_order = []").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = AdvancedParams::from_toml_str("[connect]\nmax_pdu_len_snd = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = AdvancedParams::from_toml_str("priority = \"urgent\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let err = AdvancedParams::from_toml_str(
        "[tls]\ncert_path = \"\"\nkey_path = \"/etc/qrscu/key.pem\"",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qrscu.toml");
    std::fs::write(&path, "priority = \"low\"\nquery_options = [\"datetime\"]\n").unwrap();

    let params = AdvancedParams::from_file(&path).unwrap();
    assert_eq!(params.priority, Priority::Low);
    assert_eq!(params.query_options(), vec![QueryOption::Datetime]);

    let err = AdvancedParams::from_file(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
