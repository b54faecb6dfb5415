//! Named returning keys for the common query attributes.
//!
//! Each constant is a returning key; turn it into a matching key with
//! [`AttributeKey::with_values`].

use std::collections::HashMap;

use dicom_dictionary_std::tags;
use once_cell::sync::Lazy;

use super::AttributeKey;

/// Query/Retrieve Level, needed as a matching key for C-GET
pub const QUERY_RETRIEVE_LEVEL: AttributeKey = AttributeKey::returning(tags::QUERY_RETRIEVE_LEVEL);

// Patient level
pub const PATIENT_ID: AttributeKey = AttributeKey::returning(tags::PATIENT_ID);
pub const ISSUER_OF_PATIENT_ID: AttributeKey = AttributeKey::returning(tags::ISSUER_OF_PATIENT_ID);
pub const PATIENT_NAME: AttributeKey = AttributeKey::returning(tags::PATIENT_NAME);
pub const PATIENT_BIRTH_DATE: AttributeKey = AttributeKey::returning(tags::PATIENT_BIRTH_DATE);
pub const PATIENT_SEX: AttributeKey = AttributeKey::returning(tags::PATIENT_SEX);

// Study level
pub const STUDY_INSTANCE_UID: AttributeKey = AttributeKey::returning(tags::STUDY_INSTANCE_UID);
pub const ACCESSION_NUMBER: AttributeKey = AttributeKey::returning(tags::ACCESSION_NUMBER);
pub const STUDY_ID: AttributeKey = AttributeKey::returning(tags::STUDY_ID);
pub const REFERRING_PHYSICIAN_NAME: AttributeKey =
    AttributeKey::returning(tags::REFERRING_PHYSICIAN_NAME);
pub const STUDY_DESCRIPTION: AttributeKey = AttributeKey::returning(tags::STUDY_DESCRIPTION);
pub const STUDY_DATE: AttributeKey = AttributeKey::returning(tags::STUDY_DATE);
pub const STUDY_TIME: AttributeKey = AttributeKey::returning(tags::STUDY_TIME);

// Series level
pub const SERIES_INSTANCE_UID: AttributeKey = AttributeKey::returning(tags::SERIES_INSTANCE_UID);
pub const MODALITY: AttributeKey = AttributeKey::returning(tags::MODALITY);
pub const SERIES_NUMBER: AttributeKey = AttributeKey::returning(tags::SERIES_NUMBER);
pub const SERIES_DESCRIPTION: AttributeKey = AttributeKey::returning(tags::SERIES_DESCRIPTION);

// Instance level
pub const SOP_INSTANCE_UID: AttributeKey = AttributeKey::returning(tags::SOP_INSTANCE_UID);
pub const INSTANCE_NUMBER: AttributeKey = AttributeKey::returning(tags::INSTANCE_NUMBER);

static REGISTRY: Lazy<HashMap<&'static str, AttributeKey>> = Lazy::new(|| {
    HashMap::from([
        ("QueryRetrieveLevel", QUERY_RETRIEVE_LEVEL),
        ("PatientID", PATIENT_ID),
        ("IssuerOfPatientID", ISSUER_OF_PATIENT_ID),
        ("PatientName", PATIENT_NAME),
        ("PatientBirthDate", PATIENT_BIRTH_DATE),
        ("PatientSex", PATIENT_SEX),
        ("StudyInstanceUID", STUDY_INSTANCE_UID),
        ("AccessionNumber", ACCESSION_NUMBER),
        ("StudyID", STUDY_ID),
        ("ReferringPhysicianName", REFERRING_PHYSICIAN_NAME),
        ("StudyDescription", STUDY_DESCRIPTION),
        ("StudyDate", STUDY_DATE),
        ("StudyTime", STUDY_TIME),
        ("SeriesInstanceUID", SERIES_INSTANCE_UID),
        ("Modality", MODALITY),
        ("SeriesNumber", SERIES_NUMBER),
        ("SeriesDescription", SERIES_DESCRIPTION),
        ("SOPInstanceUID", SOP_INSTANCE_UID),
        ("InstanceNumber", INSTANCE_NUMBER),
    ])
});

/// Look up a named key by its DICOM keyword
pub fn by_keyword(keyword: &str) -> Option<AttributeKey> {
    REGISTRY.get(keyword).cloned()
}

/// Keywords known to [`by_keyword`], sorted
pub fn keywords() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}
