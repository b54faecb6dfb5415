//! Common types for DIMSE query/retrieve operations

use serde::{Deserialize, Serialize};

/// DIMSE status codes as defined in DICOM PS3.7 Annex C
pub mod status {
    pub const SUCCESS: u16 = 0x0000;
    pub const PENDING: u16 = 0xFF00;
    pub const PENDING_WARNING: u16 = 0xFF01;
    pub const CANCEL: u16 = 0xFE00;
    pub const UNABLE_TO_PROCESS: u16 = 0xC000;
    pub const OUT_OF_RESOURCES: u16 = 0xA700;
    pub const IDENTIFIER_DOES_NOT_MATCH_SOP_CLASS: u16 = 0xA900;
    pub const ONE_OR_MORE_FAILURES: u16 = 0xB000;

    /// Pending statuses announce more responses to follow
    pub fn is_pending(code: u16) -> bool {
        code & 0xFF00 == PENDING
    }
}

/// DIMSE command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimseCommand {
    /// C-FIND command
    Find,
    /// C-GET command
    Get,
}

impl DimseCommand {
    /// Name of the SCU running this command, used as log prefix
    pub fn scu_name(&self) -> &'static str {
        match self {
            DimseCommand::Find => "findscu",
            DimseCommand::Get => "getscu",
        }
    }
}

/// DICOM query/retrieve levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryLevel {
    /// Patient level
    Patient,
    /// Study level
    #[default]
    Study,
    /// Series level
    Series,
    /// Image level
    Image,
}

/// Priority carried in the C-FIND / C-GET request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority
    Low,
    /// Medium priority (default)
    #[default]
    Medium,
    /// High priority
    High,
}

/// Information models a C-FIND can be issued against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindModel {
    PatientRoot,
    #[default]
    StudyRoot,
    PatientStudyOnly,
    /// Modality worklist
    Worklist,
}

/// Information models a C-GET can be issued against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrieveModel {
    PatientRoot,
    #[default]
    StudyRoot,
    PatientStudyOnly,
    CompositeInstanceRoot,
    WithoutBulkData,
}

/// Extended negotiation options for query/retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOption {
    Relational,
    Datetime,
    Fuzzy,
    Timezone,
}

/// DIMSE operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending,
    /// Operation cancelled by user
    Cancel,
    /// Operation failed with error
    Failure(u16), // DICOM status code
    /// Warning occurred during operation
    Warning(u16), // DICOM status code
}

impl DimseStatus {
    /// Classify a raw status code
    pub fn from_code(code: u16) -> Self {
        match code {
            status::SUCCESS => DimseStatus::Success,
            status::CANCEL => DimseStatus::Cancel,
            c if status::is_pending(c) => DimseStatus::Pending,
            0x0001 | 0x0107 | 0x0116 => DimseStatus::Warning(code),
            c if c & 0xF000 == 0xB000 => DimseStatus::Warning(code),
            c => DimseStatus::Failure(c),
        }
    }

    /// Raw status code
    pub fn code(&self) -> u16 {
        match self {
            DimseStatus::Success => status::SUCCESS,
            DimseStatus::Pending => status::PENDING,
            DimseStatus::Cancel => status::CANCEL,
            DimseStatus::Failure(c) | DimseStatus::Warning(c) => *c,
        }
    }

    /// Success or warning
    pub fn is_successful(&self) -> bool {
        matches!(self, DimseStatus::Success | DimseStatus::Warning(_))
    }
}

impl std::fmt::Display for QueryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryLevel::Patient => write!(f, "PATIENT"),
            QueryLevel::Study => write!(f, "STUDY"),
            QueryLevel::Series => write!(f, "SERIES"),
            QueryLevel::Image => write!(f, "IMAGE"),
        }
    }
}

impl std::str::FromStr for QueryLevel {
    type Err = crate::error::DimseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PATIENT" => Ok(QueryLevel::Patient),
            "STUDY" => Ok(QueryLevel::Study),
            "SERIES" => Ok(QueryLevel::Series),
            "IMAGE" => Ok(QueryLevel::Image),
            _ => Err(crate::error::DimseError::config(format!("Invalid query level: {}", s))),
        }
    }
}
