//! File codec collaborator used by C-STORE

use std::path::Path;

use dicom_dictionary_std::tags;
use dicom_object::{open_file, InMemDicomObject};

use crate::error::{DimseError, Result};
use crate::types::string_value;

/// A DICOM instance loaded from disk, ready to be stored
#[derive(Debug, Clone)]
pub struct LoadedInstance {
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
    pub dataset: InMemDicomObject,
}

/// Loads instances and their identifying tags from files.
pub trait FileCodec: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedInstance>;
}

/// Part 10 file codec backed by `dicom-object`
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomFileCodec;

impl FileCodec for DicomFileCodec {
    fn load(&self, path: &Path) -> Result<LoadedInstance> {
        let file = open_file(path)
            .map_err(|e| DimseError::DicomObject(format!("{}: {}", path.display(), e)))?;

        // Dataset attributes win; the file meta group is the fallback.
        let sop_class_uid = non_empty(string_value(&file, tags::SOP_CLASS_UID)).unwrap_or_else(|| {
            file.meta()
                .media_storage_sop_class_uid
                .trim_end_matches('\0')
                .to_string()
        });
        let sop_instance_uid =
            non_empty(string_value(&file, tags::SOP_INSTANCE_UID)).unwrap_or_else(|| {
                file.meta()
                    .media_storage_sop_instance_uid
                    .trim_end_matches('\0')
                    .to_string()
            });

        if sop_class_uid.is_empty() || sop_instance_uid.is_empty() {
            return Err(DimseError::DicomParsing(format!(
                "{}: missing SOP Class UID or SOP Instance UID",
                path.display()
            )));
        }

        Ok(LoadedInstance {
            sop_class_uid,
            sop_instance_uid,
            dataset: file.into_inner(),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_object::meta::FileMetaTableBuilder;

    fn write_instance(dir: &Path, name: &str, with_ids: bool) -> std::path::PathBuf {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("P1")));
        if with_ids {
            obj.put(DataElement::new(
                tags::SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.7"),
            ));
            obj.put(DataElement::new(
                tags::SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from("1.2.3.4"),
            ));
        }
        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax("1.2.840.10008.1.2.1")
                    .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
                    .media_storage_sop_instance_uid("1.2.3.4"),
            )
            .unwrap();
        let path = dir.join(name);
        file.write_to_file(&path).unwrap();
        path
    }

    #[test]
    fn test_load_extracts_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_instance(dir.path(), "ok.dcm", true);

        let instance = DicomFileCodec.load(&path).unwrap();
        assert_eq!(instance.sop_class_uid, "1.2.840.10008.5.1.4.1.1.7");
        assert_eq!(instance.sop_instance_uid, "1.2.3.4");
        assert_eq!(string_value(&instance.dataset, tags::PATIENT_ID), "P1");
    }

    #[test]
    fn test_load_falls_back_to_file_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_instance(dir.path(), "meta_only.dcm", false);

        let instance = DicomFileCodec.load(&path).unwrap();
        assert_eq!(instance.sop_instance_uid, "1.2.3.4");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DicomFileCodec.load(&dir.path().join("absent.dcm")).is_err());
    }

    #[test]
    fn test_load_non_dicom_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not a dicom file").unwrap();
        assert!(DicomFileCodec.load(&path).is_err());
    }
}
