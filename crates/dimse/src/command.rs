//! DIMSE command sets
//!
//! Builders for the request command sets this SCU issues and accessors for
//! the response command sets it consumes. Command sets are always encoded in
//! Implicit VR Little Endian by the link layer.

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;

use crate::error::{DimseError, Result};
use crate::types::{string_value, uid_value, DimseStatus, TransferProgress};

/// Command Field values (PS3.7 E.1)
pub mod field {
    pub const C_STORE_RQ: u16 = 0x0001;
    pub const C_STORE_RSP: u16 = 0x8001;
    pub const C_FIND_RQ: u16 = 0x0020;
    pub const C_FIND_RSP: u16 = 0x8020;
    pub const C_MOVE_RQ: u16 = 0x0021;
    pub const C_MOVE_RSP: u16 = 0x8021;
    pub const C_ECHO_RQ: u16 = 0x0030;
    pub const C_ECHO_RSP: u16 = 0x8030;
}

/// Command Data Set Type meaning "no dataset follows"
pub const NO_DATASET: u16 = 0x0101;
/// Command Data Set Type meaning "a dataset follows"
pub const DATASET_PRESENT: u16 = 0x0000;
/// Priority LOW, used for every request we issue
pub const PRIORITY_LOW: u16 = 0x0002;

/// One DIMSE message: a command set and an optional dataset
#[derive(Debug, Clone)]
pub struct DimseMessage {
    pub command: InMemDicomObject,
    pub dataset: Option<InMemDicomObject>,
}

impl DimseMessage {
    pub fn new(command: InMemDicomObject, dataset: Option<InMemDicomObject>) -> Self {
        Self { command, dataset }
    }

    pub fn command_field(&self) -> Result<u16> {
        required_u16(&self.command, tags::COMMAND_FIELD)
    }

    pub fn message_id_responded(&self) -> Option<u16> {
        optional_u16(&self.command, tags::MESSAGE_ID_BEING_RESPONDED_TO)
    }

    /// Raw status of a response
    pub fn status_code(&self) -> Result<u16> {
        required_u16(&self.command, tags::STATUS)
    }

    pub fn status(&self) -> Result<DimseStatus> {
        self.status_code().map(DimseStatus::from_code)
    }

    /// Sub-operation counters of a C-MOVE response, if the peer sent any.
    ///
    /// Missing individual counters read as zero.
    pub fn sub_operations(&self) -> Option<TransferProgress> {
        let remaining = optional_u16(&self.command, tags::NUMBER_OF_REMAINING_SUBOPERATIONS);
        let completed = optional_u16(&self.command, tags::NUMBER_OF_COMPLETED_SUBOPERATIONS);
        let failed = optional_u16(&self.command, tags::NUMBER_OF_FAILED_SUBOPERATIONS);
        if remaining.is_none() && completed.is_none() && failed.is_none() {
            return None;
        }
        Some(TransferProgress::new(
            u32::from(completed.unwrap_or(0)),
            u32::from(remaining.unwrap_or(0)),
            u32::from(failed.unwrap_or(0)),
        ))
    }

    /// Check that this message answers `message_id` with the expected field.
    pub fn expect_response(&self, expected_field: u16, message_id: u16) -> Result<()> {
        let command_field = self.command_field()?;
        if command_field != expected_field {
            return Err(DimseError::protocol(format!(
                "unexpected command field 0x{:04x}, expected 0x{:04x}",
                command_field, expected_field
            )));
        }
        match self.message_id_responded() {
            Some(id) if id != message_id => Err(DimseError::protocol(format!(
                "response to message {} while waiting for {}",
                id, message_id
            ))),
            _ => Ok(()),
        }
    }
}

/// Whether a command set announces a following dataset
pub fn has_dataset(command: &InMemDicomObject) -> bool {
    optional_u16(command, tags::COMMAND_DATA_SET_TYPE)
        .map(|t| t != NO_DATASET)
        .unwrap_or(false)
}

pub fn echo_rq(message_id: u16, sop_class_uid: &str) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uid_value(sop_class_uid)),
        us(tags::COMMAND_FIELD, field::C_ECHO_RQ),
        us(tags::MESSAGE_ID, message_id),
        us(tags::COMMAND_DATA_SET_TYPE, NO_DATASET),
    ])
}

pub fn find_rq(message_id: u16, sop_class_uid: &str) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uid_value(sop_class_uid)),
        us(tags::COMMAND_FIELD, field::C_FIND_RQ),
        us(tags::MESSAGE_ID, message_id),
        us(tags::PRIORITY, PRIORITY_LOW),
        us(tags::COMMAND_DATA_SET_TYPE, DATASET_PRESENT),
    ])
}

pub fn move_rq(message_id: u16, sop_class_uid: &str, destination: &str) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uid_value(sop_class_uid)),
        us(tags::COMMAND_FIELD, field::C_MOVE_RQ),
        us(tags::MESSAGE_ID, message_id),
        us(tags::PRIORITY, PRIORITY_LOW),
        us(tags::COMMAND_DATA_SET_TYPE, DATASET_PRESENT),
        DataElement::new(
            tags::MOVE_DESTINATION,
            VR::AE,
            PrimitiveValue::from(padded_ae(destination)),
        ),
    ])
}

pub fn store_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uid_value(sop_class_uid)),
        us(tags::COMMAND_FIELD, field::C_STORE_RQ),
        us(tags::MESSAGE_ID, message_id),
        us(tags::PRIORITY, PRIORITY_LOW),
        us(tags::COMMAND_DATA_SET_TYPE, DATASET_PRESENT),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            uid_value(sop_instance_uid),
        ),
    ])
}

/// Affected SOP Class UID of a command set, without padding
pub fn affected_sop_class(command: &InMemDicomObject) -> String {
    string_value(command, tags::AFFECTED_SOP_CLASS_UID)
}

fn us(tag: Tag, value: u16) -> InMemElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

fn padded_ae(ae: &str) -> String {
    let mut value = ae.to_string();
    if value.len() % 2 == 1 {
        value.push(' ');
    }
    value
}

fn optional_u16(obj: &InMemDicomObject, tag: Tag) -> Option<u16> {
    obj.get(tag).and_then(|e| e.to_int::<u16>().ok())
}

fn required_u16(obj: &InMemDicomObject, tag: Tag) -> Result<u16> {
    obj.get(tag)
        .ok_or_else(|| DimseError::protocol(format!("command set is missing {}", tag)))?
        .to_int::<u16>()
        .map_err(|e| DimseError::protocol(format!("invalid value for {}: {}", tag, e)))
}
