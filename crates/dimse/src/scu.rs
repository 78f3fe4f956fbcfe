//! Service Class User (SCU) workflows: C-ECHO, C-FIND, C-MOVE, C-STORE
//!
//! Every workflow opens one association scoped to the call, drives its
//! exchange, and returns a [`ServiceResult`]. Failures never escape as
//! errors or panics from the protocol layer; they are folded into the
//! result by the status mapper.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use tracing::{debug, error, info, warn};

use crate::association::Association;
use crate::codec::{DicomFileCodec, FileCodec};
use crate::config::{AeTitle, RemoteNode, ScuConfig};
use crate::error::DimseError;
use crate::link::{Connector, UlConnector};
use crate::status;
use crate::types::{uid_value, QueryCriteria, QueryMatch, ServiceResult, TransferProgress};

/// Verification SOP Class
pub const VERIFICATION: &str = "1.2.840.10008.1.1";
/// Study Root Query/Retrieve Information Model - FIND
pub const STUDY_ROOT_FIND: &str = "1.2.840.10008.5.1.4.1.2.2.1";
/// Study Root Query/Retrieve Information Model - MOVE
pub const STUDY_ROOT_MOVE: &str = "1.2.840.10008.5.1.4.1.2.2.2";
/// Secondary Capture Image Storage, the one storage class proposed by C-STORE
pub const SECONDARY_CAPTURE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.7";

/// DIMSE Service Class User
pub struct DimseScu {
    connector: Arc<dyn Connector>,
    codec: Arc<dyn FileCodec>,
    max_pdu: u32,
}

impl DimseScu {
    /// Create an SCU speaking the upper layer protocol over TCP
    pub fn new(config: &ScuConfig) -> Self {
        Self {
            connector: Arc::new(UlConnector::new()),
            codec: Arc::new(DicomFileCodec),
            max_pdu: config.max_pdu,
        }
    }

    /// Create an SCU over custom link and codec implementations
    pub fn with_parts(connector: Arc<dyn Connector>, codec: Arc<dyn FileCodec>, max_pdu: u32) -> Self {
        Self {
            connector,
            codec,
            max_pdu,
        }
    }

    fn open(
        &self,
        local: &AeTitle,
        node: &RemoteNode,
        abstract_syntax: &str,
        timeout_seconds: u32,
    ) -> Result<Association, ServiceResult> {
        Association::open(
            self.connector.as_ref(),
            local,
            node,
            abstract_syntax,
            timeout_seconds,
            self.max_pdu,
        )
        .map_err(|e| {
            error!("Association with {} failed: {}", node, e);
            status::error_result(&e, "Association")
        })
    }

    /// Send a C-ECHO request to a remote node
    pub fn echo(&self, local: &AeTitle, node: &RemoteNode, timeout_seconds: u32) -> ServiceResult {
        info!("Sending C-ECHO to {}", node);

        let mut association = match self.open(local, node, VERIFICATION, timeout_seconds) {
            Ok(a) => a,
            Err(result) => return result,
        };

        let result = match association.echo(VERIFICATION) {
            Ok(code) => {
                let mapped = status::from_protocol_status(code);
                if mapped.is_ok() {
                    ServiceResult::ok("C-ECHO successful", code)
                } else {
                    mapped.context("C-ECHO failed")
                }
            }
            Err(e) => status::error_result(&e, "C-ECHO"),
        };
        association.close();

        info!("C-ECHO to {} finished: {}", node, result);
        result
    }

    /// Query a remote node for studies (C-FIND at STUDY level).
    ///
    /// `on_match` is called once per pending response carrying an
    /// identifier, in the order the peer delivers them.
    pub fn find(
        &self,
        local: &AeTitle,
        node: &RemoteNode,
        criteria: &QueryCriteria,
        mut on_match: impl FnMut(QueryMatch),
        timeout_seconds: u32,
    ) -> ServiceResult {
        info!("Sending C-FIND to {}", node);
        debug!("C-FIND criteria: {:?}", criteria);

        let mut association = match self.open(local, node, STUDY_ROOT_FIND, timeout_seconds) {
            Ok(a) => a,
            Err(result) => return result,
        };

        let identifier = criteria.to_identifier();
        let mut matches = 0usize;
        let outcome = association.find(STUDY_ROOT_FIND, &identifier, |dataset| {
            matches += 1;
            on_match(QueryMatch::from_identifier(dataset));
        });
        association.close();

        let result = match outcome {
            Ok(code) => {
                if !status::is_successful_status(&crate::types::DimseStatus::from_code(code)) {
                    warn!("C-FIND to {} ended with status 0x{:04x}", node, code);
                }
                ServiceResult::ok(
                    format!(
                        "C-FIND completed, {} matches found (final status 0x{:04x})",
                        matches, code
                    ),
                    code,
                )
            }
            Err(e) => status::error_result(&e, "C-FIND"),
        };
        info!("C-FIND to {} finished: {}", node, result);
        result
    }

    /// Ask a remote node to send a study to `local` (C-MOVE at STUDY level).
    ///
    /// The peer pushes instances to the store service listening as `local`;
    /// writing them into `destination` is that listener's job.
    pub fn move_study(
        &self,
        local: &AeTitle,
        node: &RemoteNode,
        study_instance_uid: &str,
        destination: &Path,
        on_progress: impl FnMut(TransferProgress),
        timeout_seconds: u32,
    ) -> ServiceResult {
        let study_instance_uid = study_instance_uid.trim();
        if study_instance_uid.is_empty() {
            return status::error_result(
                &DimseError::invalid("study instance UID is empty"),
                "C-MOVE",
            );
        }
        info!(
            "Sending C-MOVE of study {} from {} to {} (files expected in {})",
            study_instance_uid,
            node,
            local,
            destination.display()
        );

        let mut association = match self.open(local, node, STUDY_ROOT_MOVE, timeout_seconds) {
            Ok(a) => a,
            Err(result) => return result,
        };

        let mut identifier = InMemDicomObject::new_empty();
        identifier.put(DataElement::new(
            tags::QUERY_RETRIEVE_LEVEL,
            VR::CS,
            PrimitiveValue::from("STUDY"),
        ));
        identifier.put(DataElement::new(
            tags::STUDY_INSTANCE_UID,
            VR::UI,
            uid_value(study_instance_uid),
        ));

        let outcome = association.retrieve(STUDY_ROOT_MOVE, &identifier, local, on_progress);
        association.close();

        let result = match outcome {
            Ok(outcome) => ServiceResult::ok(
                format!(
                    "C-MOVE completed: {} succeeded, {} failed (final status 0x{:04x})",
                    outcome.progress.completed, outcome.progress.failed, outcome.status
                ),
                outcome.status,
            ),
            Err(e) => status::error_result(&e, "C-MOVE"),
        };
        info!("C-MOVE from {} finished: {}", node, result);
        result
    }

    /// Send files to a remote node (C-STORE), strictly in input order.
    ///
    /// Per-file failures are counted and reported through `on_progress`;
    /// they never stop the batch. The overall result is `Ok` once every file
    /// has been attempted.
    pub fn store(
        &self,
        local: &AeTitle,
        node: &RemoteNode,
        files: &[PathBuf],
        mut on_progress: impl FnMut(TransferProgress),
        timeout_seconds: u32,
    ) -> ServiceResult {
        if files.is_empty() {
            return status::error_result(&DimseError::invalid("no files to send"), "C-STORE");
        }
        info!("Sending {} file(s) to {} via C-STORE", files.len(), node);

        let mut association =
            match self.open(local, node, SECONDARY_CAPTURE_STORAGE, timeout_seconds) {
                Ok(a) => a,
                Err(result) => return result,
            };

        let total = u32::try_from(files.len()).unwrap_or(u32::MAX);
        let mut completed = 0u32;
        let mut failed = 0u32;

        for path in files {
            match self.store_one(&mut association, path) {
                Ok(()) => completed += 1,
                Err(e) => {
                    warn!("C-STORE of {} failed: {}", path.display(), e);
                    failed += 1;
                }
            }
            on_progress(TransferProgress::new(
                completed,
                total.saturating_sub(completed + failed),
                failed,
            ));
        }
        association.close();

        let result = ServiceResult::ok(
            format!("C-STORE completed: {} succeeded, {} failed", completed, failed),
            0,
        );
        info!("C-STORE to {} finished: {}", node, result);
        result
    }

    fn store_one(&self, association: &mut Association, path: &Path) -> crate::Result<()> {
        let instance = self.codec.load(path)?;
        let context = association
            .context_for(&instance.sop_class_uid)
            .cloned()
            .ok_or_else(|| {
                DimseError::operation_failed(format!(
                    "no accepted presentation context for SOP class {}",
                    instance.sop_class_uid
                ))
            })?;
        let code = association.store(
            &context,
            &instance.sop_class_uid,
            &instance.sop_instance_uid,
            &instance.dataset,
        )?;
        if code != 0 {
            return Err(DimseError::operation_failed(format!(
                "peer answered DIMSE status 0x{:04x}",
                code
            )));
        }
        debug!("Stored {}", instance.sop_instance_uid);
        Ok(())
    }
}

/// Builder for creating SCU instances with custom configurations
pub struct ScuBuilder {
    config: ScuConfig,
    connector: Option<Arc<dyn Connector>>,
    codec: Option<Arc<dyn FileCodec>>,
}

impl ScuBuilder {
    /// Start building a new SCU
    pub fn new() -> Self {
        Self {
            config: ScuConfig::default(),
            connector: None,
            codec: None,
        }
    }

    /// Set the maximum PDU size
    pub fn max_pdu(mut self, size: u32) -> Self {
        self.config.max_pdu = size;
        self
    }

    /// Use a custom link implementation
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use a custom file codec
    pub fn codec(mut self, codec: Arc<dyn FileCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Build the SCU
    pub fn build(self) -> crate::Result<DimseScu> {
        self.config.validate()?;
        Ok(DimseScu::with_parts(
            self.connector.unwrap_or_else(|| Arc::new(UlConnector::new())),
            self.codec.unwrap_or_else(|| Arc::new(DicomFileCodec)),
            self.config.max_pdu,
        ))
    }
}

impl Default for ScuBuilder {
    fn default() -> Self {
        Self::new()
    }
}
