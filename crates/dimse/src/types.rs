//! Common types for DIMSE operations

use std::fmt;

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;
use serde::{Deserialize, Serialize};

use crate::MAX_MESSAGE_LEN;

/// Terminal outcome category of a service workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Ok,
    Error,
    /// Reserved; no workflow currently produces it
    NotFound,
    /// Reserved; no workflow currently produces it
    Cancelled,
    Timeout,
}

/// Result returned by every service workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub status: ServiceStatus,
    /// Human readable outcome, at most 255 characters
    pub message: String,
    /// Raw DIMSE status of the final response (0 = success)
    pub protocol_status: u16,
}

impl ServiceResult {
    /// Build a result, truncating the message to the allowed length.
    pub fn new(status: ServiceStatus, message: impl Into<String>, protocol_status: u16) -> Self {
        let mut message = message.into();
        if let Some((idx, _)) = message.char_indices().nth(MAX_MESSAGE_LEN) {
            message.truncate(idx);
        }
        Self {
            status,
            message,
            protocol_status,
        }
    }

    pub fn ok(message: impl Into<String>, protocol_status: u16) -> Self {
        Self::new(ServiceStatus::Ok, message, protocol_status)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ServiceStatus::Error, message, 0)
    }

    pub fn is_ok(&self) -> bool {
        self.status == ServiceStatus::Ok
    }

    /// Prefix the message with the failing operation, keeping status and code.
    pub fn context(self, prefix: &str) -> Self {
        Self::new(
            self.status,
            format!("{}: {}", prefix, self.message),
            self.protocol_status,
        )
    }
}

impl fmt::Display for ServiceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} (0x{:04x}): {}",
            self.status, self.protocol_status, self.message
        )
    }
}

/// DIMSE operation status, classified per PS3.7 Annex C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending,
    /// Operation cancelled by user
    Cancel,
    /// Operation failed with error
    Failure(u16),
    /// Warning occurred during operation
    Warning(u16),
}

impl DimseStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => DimseStatus::Success,
            0xFF00 | 0xFF01 => DimseStatus::Pending,
            0xFE00 => DimseStatus::Cancel,
            0x0001 | 0x0107 | 0x0116 | 0xB000..=0xBFFF => DimseStatus::Warning(code),
            _ => DimseStatus::Failure(code),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, DimseStatus::Pending)
    }
}

/// Progress of a C-MOVE or C-STORE batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub completed: u32,
    pub remaining: u32,
    pub failed: u32,
}

impl TransferProgress {
    pub fn new(completed: u32, remaining: u32, failed: u32) -> Self {
        Self {
            completed,
            remaining,
            failed,
        }
    }
}

/// Study-level search criteria for C-FIND.
///
/// `None` or an empty string is a wildcard. Populated fields are sent as
/// matching keys verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCriteria {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub study_instance_uid: Option<String>,
    pub study_date: Option<String>,
    pub accession_number: Option<String>,
    pub modality: Option<String>,
}

impl QueryCriteria {
    pub fn with_patient_id(mut self, value: impl Into<String>) -> Self {
        self.patient_id = Some(value.into());
        self
    }

    pub fn with_patient_name(mut self, value: impl Into<String>) -> Self {
        self.patient_name = Some(value.into());
        self
    }

    pub fn with_study_instance_uid(mut self, value: impl Into<String>) -> Self {
        self.study_instance_uid = Some(value.into());
        self
    }

    pub fn with_study_date(mut self, value: impl Into<String>) -> Self {
        self.study_date = Some(value.into());
        self
    }

    pub fn with_accession_number(mut self, value: impl Into<String>) -> Self {
        self.accession_number = Some(value.into());
        self
    }

    pub fn with_modality(mut self, value: impl Into<String>) -> Self {
        self.modality = Some(value.into());
        self
    }

    /// Build the STUDY level identifier for a C-FIND request.
    ///
    /// Every supported key is present: populated ones as filters, the rest
    /// as empty universal matches. Study description and patient birth date
    /// are always requested as return keys.
    pub fn to_identifier(&self) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::QUERY_RETRIEVE_LEVEL,
            VR::CS,
            PrimitiveValue::from("STUDY"),
        ));

        let keys: [(Tag, VR, &Option<String>); 6] = [
            (tags::PATIENT_ID, VR::LO, &self.patient_id),
            (tags::PATIENT_NAME, VR::PN, &self.patient_name),
            (tags::STUDY_DATE, VR::DA, &self.study_date),
            (tags::ACCESSION_NUMBER, VR::SH, &self.accession_number),
            (tags::MODALITIES_IN_STUDY, VR::CS, &self.modality),
            (tags::STUDY_INSTANCE_UID, VR::UI, &self.study_instance_uid),
        ];
        for (tag, vr, value) in keys {
            obj.put(key_element(tag, vr, value.as_deref()));
        }

        for (tag, vr) in [
            (tags::STUDY_DESCRIPTION, VR::LO),
            (tags::PATIENT_BIRTH_DATE, VR::DA),
        ] {
            obj.put(key_element(tag, vr, None));
        }

        obj
    }
}

fn key_element(tag: Tag, vr: VR, value: Option<&str>) -> InMemElement {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if vr == VR::UI => DataElement::new(tag, vr, uid_value(v)),
        Some(v) => DataElement::new(tag, vr, PrimitiveValue::from(v)),
        None => DataElement::new(tag, vr, PrimitiveValue::Empty),
    }
}

/// UID value padded with a trailing NUL to an even length.
pub(crate) fn uid_value(uid: &str) -> PrimitiveValue {
    let mut value = uid.trim_end_matches('\0').to_string();
    if value.len() % 2 == 1 {
        value.push('\0');
    }
    PrimitiveValue::from(value)
}

/// One study returned by a C-FIND. Absent attributes are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub patient_id: String,
    pub patient_name: String,
    pub patient_birth_date: String,
    pub study_instance_uid: String,
    pub study_date: String,
    pub study_description: String,
    pub accession_number: String,
    pub modalities_in_study: String,
}

impl QueryMatch {
    pub fn from_identifier(obj: &InMemDicomObject) -> Self {
        Self {
            patient_id: string_value(obj, tags::PATIENT_ID),
            patient_name: string_value(obj, tags::PATIENT_NAME),
            patient_birth_date: string_value(obj, tags::PATIENT_BIRTH_DATE),
            study_instance_uid: string_value(obj, tags::STUDY_INSTANCE_UID),
            study_date: string_value(obj, tags::STUDY_DATE),
            study_description: string_value(obj, tags::STUDY_DESCRIPTION),
            accession_number: string_value(obj, tags::ACCESSION_NUMBER),
            modalities_in_study: string_value(obj, tags::MODALITIES_IN_STUDY),
        }
    }
}

/// Read a string attribute, dropping value padding. Missing means empty.
pub(crate) fn string_value(obj: &InMemDicomObject, tag: Tag) -> String {
    obj.get(tag)
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).trim_start().to_string())
        .unwrap_or_default()
}
