//! Storage presentation contexts offered to the peer during a C-GET
//!
//! A bundled table covers the common image and document classes. Callers
//! may replace it with their own [`StorageClassTable`]. Entries are named by
//! keyword or by dotted UID.

use std::collections::BTreeMap;

use dicom_core::dictionary::{UidDictionary, UidDictionaryEntry};
use dicom_dictionary_std::{uids, StandardSopClassDictionary};
use serde::{Deserialize, Serialize};

use crate::error::{OpError, Result};

/// Format version understood by [`StorageClassTable::from_toml_str`]
pub const TABLE_VERSION: u32 = 1;

static BUNDLED_TABLE: &str = include_str!("resources/store-tcs.toml");

/// Transfer syntax keywords of the standard registry
static TRANSFER_SYNTAXES: &[(&str, &str)] = &[
    ("ImplicitVRLittleEndian", uids::IMPLICIT_VR_LITTLE_ENDIAN),
    ("ExplicitVRLittleEndian", uids::EXPLICIT_VR_LITTLE_ENDIAN),
    ("EncapsulatedUncompressedExplicitVRLittleEndian", uids::ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN),
    ("DeflatedExplicitVRLittleEndian", uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN),
    ("ExplicitVRBigEndian", uids::EXPLICIT_VR_BIG_ENDIAN),
    ("JPEGBaseline8Bit", uids::JPEG_BASELINE8_BIT),
    ("JPEGExtended12Bit", uids::JPEG_EXTENDED12_BIT),
    ("JPEGLossless", uids::JPEG_LOSSLESS),
    ("JPEGLosslessSV1", uids::JPEG_LOSSLESS_SV1),
    ("JPEGLSLossless", uids::JPEGLS_LOSSLESS),
    ("JPEGLSNearLossless", uids::JPEGLS_NEAR_LOSSLESS),
    ("JPEG2000Lossless", uids::JPEG2000_LOSSLESS),
    ("JPEG2000", uids::JPEG2000),
    ("JPEG2000MCLossless", uids::JPEG2000MC_LOSSLESS),
    ("JPEG2000MC", uids::JPEG2000MC),
    ("JPIPReferenced", uids::JPIP_REFERENCED),
    ("JPIPReferencedDeflate", uids::JPIP_REFERENCED_DEFLATE),
    ("MPEG2MPML", uids::MPEG2MPML),
    ("MPEG2MPMLF", uids::MPEG2MPMLF),
    ("MPEG2MPHL", uids::MPEG2MPHL),
    ("MPEG2MPHLF", uids::MPEG2MPHLF),
    ("MPEG4HP41", uids::MPEG4HP41),
    ("MPEG4HP41F", uids::MPEG4HP41F),
    ("MPEG4HP41BD", uids::MPEG4HP41BD),
    ("MPEG4HP41BDF", uids::MPEG4HP41BDF),
    ("MPEG4HP422D", uids::MPEG4HP422D),
    ("MPEG4HP422DF", uids::MPEG4HP422DF),
    ("MPEG4HP423D", uids::MPEG4HP423D),
    ("MPEG4HP423DF", uids::MPEG4HP423DF),
    ("MPEG4HP42STEREO", uids::MPEG4HP42STEREO),
    ("MPEG4HP42STEREOF", uids::MPEG4HP42STEREOF),
    ("HEVCMP51", uids::HEVCMP51),
    ("HEVCM10P51", uids::HEVCM10P51),
    ("JPEGXLLossless", uids::JPEGXL_LOSSLESS),
    ("JPEGXLJPEGRecompression", uids::JPEGXLJPEG_RECOMPRESSION),
    ("JPEGXL", uids::JPEGXL),
    ("HTJ2KLossless", uids::HTJ2K_LOSSLESS),
    ("HTJ2KLosslessRPCL", uids::HTJ2K_LOSSLESS_RPCL),
    ("HTJ2K", uids::HTJ2K),
    ("JPIPHTJ2KReferenced", uids::JPIPHTJ2K_REFERENCED),
    ("JPIPHTJ2KReferencedDeflate", uids::JPIPHTJ2K_REFERENCED_DEFLATE),
    ("RLELossless", uids::RLE_LOSSLESS),
    ("SMPTEST211020UncompressedProgressiveActiveVideo", uids::SMPTEST211020_UNCOMPRESSED_PROGRESSIVE_ACTIVE_VIDEO),
    ("SMPTEST211020UncompressedInterlacedActiveVideo", uids::SMPTEST211020_UNCOMPRESSED_INTERLACED_ACTIVE_VIDEO),
    ("SMPTEST211030PCMDigitalAudio", uids::SMPTEST211030PCM_DIGITAL_AUDIO),
    ("DeflatedImageFrameCompression", uids::DEFLATED_IMAGE_FRAME_COMPRESSION),
];

/// SOP classes and the transfer syntaxes accepted for each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClassTable {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub classes: BTreeMap<String, Vec<String>>,
}

/// One resolved storage presentation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferedStorageClass {
    pub class_uid: String,
    pub transfer_syntaxes: Vec<String>,
}

fn default_version() -> u32 {
    TABLE_VERSION
}

impl Default for StorageClassTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            classes: BTreeMap::new(),
        }
    }
}

impl StorageClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED_TABLE)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let table: StorageClassTable = toml::from_str(toml_str)
            .map_err(|e| OpError::StorageClasses(e.to_string()))?;
        if table.version != TABLE_VERSION {
            return Err(OpError::StorageClasses(format!(
                "Unsupported table version {} (expected {})",
                table.version, TABLE_VERSION
            )));
        }
        Ok(table)
    }

    pub fn insert<I, S>(&mut self, class: impl Into<String>, transfer_syntaxes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes
            .insert(class.into(), transfer_syntaxes.into_iter().map(Into::into).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolve every entry to UIDs, in key order.
    ///
    /// Resolution stops at the first entry that cannot be resolved; the
    /// entries before it are returned together with the failure.
    pub fn resolve(&self) -> (Vec<OfferedStorageClass>, Option<OpError>) {
        let mut resolved = Vec::with_capacity(self.classes.len());
        for (class, syntaxes) in &self.classes {
            match resolve_entry(class, syntaxes) {
                Ok(entry) => resolved.push(entry),
                Err(e) => return (resolved, Some(e)),
            }
        }
        (resolved, None)
    }
}

fn resolve_entry(class: &str, syntaxes: &[String]) -> Result<OfferedStorageClass> {
    let class_uid = sop_class_uid(class)?;
    if syntaxes.is_empty() {
        return Err(OpError::StorageClasses(format!(
            "No transfer syntax for {}",
            class
        )));
    }
    let transfer_syntaxes = syntaxes
        .iter()
        .map(|ts| transfer_syntax_uid(ts))
        .collect::<Result<Vec<_>>>()?;
    Ok(OfferedStorageClass {
        class_uid,
        transfer_syntaxes,
    })
}

/// SOP class keyword from the standard registry, or a dotted UID as it is
fn sop_class_uid(name: &str) -> Result<String> {
    let name = name.trim();
    if is_uid(name) {
        return Ok(name.to_string());
    }
    StandardSopClassDictionary
        .by_keyword(name)
        .map(|entry| entry.uid().to_string())
        .ok_or_else(|| OpError::StorageClasses(format!("Unknown SOP class keyword: {}", name)))
}

/// Transfer syntax keyword, dotted UID or `*` for any
fn transfer_syntax_uid(name: &str) -> Result<String> {
    let name = name.trim();
    if name == "*" || is_uid(name) {
        return Ok(name.to_string());
    }
    TRANSFER_SYNTAXES
        .iter()
        .find(|(keyword, _)| *keyword == name)
        .map(|(_, uid)| uid.to_string())
        .ok_or_else(|| OpError::StorageClasses(format!("Unknown transfer syntax keyword: {}", name)))
}

fn is_uid(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value.chars().next().is_some_and(|c| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || c == '.')
}
