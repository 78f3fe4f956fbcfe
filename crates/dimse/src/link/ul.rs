//! `dicom-ul` backed link

use std::net::TcpStream;

use bytes::BytesMut;
use dicom_encoding::TransferSyntaxIndex;
use dicom_encoding::transfer_syntax::TransferSyntax;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu, PresentationContextResultReason};
use dicom_ul::association::Error as UlError;
use dicom_ul::{ClientAssociation, ClientAssociationOptions};
use tracing::{debug, warn};

use super::{AssociationParameters, Connector, DimseLink, PresentationContext, IMPLICIT_VR_LE};
use crate::command::{has_dataset, DimseMessage};
use crate::error::{DimseError, Result};
use crate::MAX_PDU;

/// PDV item header: item length (4), context id (1), control header (1)
const PDV_HEADER_LEN: u32 = 6;

/// Connector speaking the DICOM upper layer protocol over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct UlConnector;

impl UlConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for UlConnector {
    fn negotiate(&self, params: &AssociationParameters) -> Result<Box<dyn DimseLink>> {
        let mut options = ClientAssociationOptions::new()
            .calling_ae_title(params.calling_ae.as_str().to_string())
            .called_ae_title(params.called_ae.as_str().to_string())
            .with_presentation_context(
                params.abstract_syntax.clone(),
                params.transfer_syntaxes.clone(),
            )
            .max_pdu_length(params.max_pdu);
        if let Some(timeout) = params.timeout {
            options = options
                .connection_timeout(timeout)
                .read_timeout(timeout)
                .write_timeout(timeout);
        }

        debug!(
            "Requesting association {} -> {} at {}",
            params.calling_ae, params.called_ae, params.peer_address
        );
        let association = options
            .establish(params.peer_address.as_str())
            .map_err(|e| match e {
                // dicom-ul has already aborted the association.
                UlError::NoAcceptedPresentationContexts { .. } => {
                    DimseError::PresentationContextRejected
                }
                other => DimseError::from_ul(other),
            })?;

        let contexts = association
            .presentation_contexts()
            .iter()
            .filter(|pc| matches!(pc.reason, PresentationContextResultReason::Acceptance))
            .map(|pc| PresentationContext {
                id: pc.id,
                abstract_syntax: params.abstract_syntax.clone(),
                transfer_syntax: pc.transfer_syntax.trim_end_matches('\0').to_string(),
            })
            .collect::<Vec<_>>();
        debug!("Peer accepted {} presentation context(s)", contexts.len());

        let max_fragment = fragment_len(association.acceptor_max_pdu_length());

        Ok(Box::new(UlLink {
            association: Some(association),
            contexts,
            max_fragment,
        }))
    }
}

struct UlLink {
    association: Option<ClientAssociation<TcpStream>>,
    contexts: Vec<PresentationContext>,
    max_fragment: usize,
}

impl UlLink {
    fn association(&mut self) -> Result<&mut ClientAssociation<TcpStream>> {
        self.association
            .as_mut()
            .ok_or_else(|| DimseError::protocol("association already closed"))
    }

    fn context_syntax(&self, id: u8) -> Result<&'static TransferSyntax> {
        let uid = self
            .contexts
            .iter()
            .find(|pc| pc.id == id)
            .map(|pc| pc.transfer_syntax.as_str())
            .ok_or_else(|| DimseError::protocol(format!("unknown presentation context {}", id)))?;
        transfer_syntax(uid)
    }

    fn send_fragments(&mut self, context_id: u8, command: bool, bytes: &[u8]) -> Result<()> {
        let max_fragment = self.max_fragment;
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![bytes]
        } else {
            bytes.chunks(max_fragment).collect()
        };
        let last = chunks.len() - 1;
        let association = self.association()?;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let value_type = if command {
                PDataValueType::Command
            } else {
                PDataValueType::Data
            };
            let pdu = Pdu::PData {
                data: vec![PDataValue {
                    presentation_context_id: context_id,
                    value_type,
                    is_last: i == last,
                    data: chunk.to_vec(),
                }],
            };
            association.send(&pdu).map_err(DimseError::from_ul)?;
        }
        Ok(())
    }
}

impl DimseLink for UlLink {
    fn accepted_contexts(&self) -> &[PresentationContext] {
        &self.contexts
    }

    fn send(
        &mut self,
        context: &PresentationContext,
        command: &InMemDicomObject,
        dataset: Option<&InMemDicomObject>,
    ) -> Result<()> {
        let mut command_bytes = Vec::with_capacity(128);
        command
            .write_dataset_with_ts(&mut command_bytes, transfer_syntax(IMPLICIT_VR_LE)?)
            .map_err(|e| DimseError::DicomObject(e.to_string()))?;
        self.send_fragments(context.id, true, &command_bytes)?;

        if let Some(dataset) = dataset {
            let ts = transfer_syntax(&context.transfer_syntax)?;
            let mut data_bytes = Vec::new();
            dataset
                .write_dataset_with_ts(&mut data_bytes, ts)
                .map_err(|e| DimseError::DicomObject(e.to_string()))?;
            self.send_fragments(context.id, false, &data_bytes)?;
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<DimseMessage> {
        let mut command_bytes = BytesMut::new();
        let mut data_bytes = BytesMut::new();
        let mut command: Option<InMemDicomObject> = None;

        loop {
            let pdu = self.association()?.receive().map_err(DimseError::from_ul)?;
            match pdu {
                Pdu::PData { data } => {
                    for pdv in data {
                        match pdv.value_type {
                            PDataValueType::Command => {
                                command_bytes.extend_from_slice(&pdv.data);
                                if pdv.is_last {
                                    let obj = InMemDicomObject::read_dataset_with_ts(
                                        &command_bytes[..],
                                        transfer_syntax(IMPLICIT_VR_LE)?,
                                    )
                                    .map_err(|e| DimseError::DicomParsing(e.to_string()))?;
                                    command = Some(obj);
                                }
                            }
                            PDataValueType::Data => {
                                data_bytes.extend_from_slice(&pdv.data);
                                if pdv.is_last {
                                    let cmd = command.take().ok_or_else(|| {
                                        DimseError::protocol("dataset received before command")
                                    })?;
                                    let ts = self.context_syntax(pdv.presentation_context_id)?;
                                    let dataset =
                                        InMemDicomObject::read_dataset_with_ts(&data_bytes[..], ts)
                                            .map_err(|e| DimseError::DicomParsing(e.to_string()))?;
                                    return Ok(DimseMessage::new(cmd, Some(dataset)));
                                }
                            }
                        }
                    }

                    if let Some(cmd) = command.take() {
                        if has_dataset(&cmd) {
                            command = Some(cmd);
                        } else {
                            return Ok(DimseMessage::new(cmd, None));
                        }
                    }
                }
                Pdu::AbortRQ { source } => {
                    self.association = None;
                    return Err(DimseError::AssociationRejected(format!(
                        "peer aborted association: {:?}",
                        source
                    )));
                }
                Pdu::ReleaseRQ => {
                    if let Err(e) = self.association()?.send(&Pdu::ReleaseRP) {
                        warn!("Failed to answer peer release request: {}", e);
                    }
                    self.association = None;
                    return Err(DimseError::protocol("peer released association mid-exchange"));
                }
                other => {
                    return Err(DimseError::protocol(format!(
                        "unexpected PDU while waiting for a response: {:?}",
                        other
                    )));
                }
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        match self.association.take() {
            Some(association) => association.release().map_err(DimseError::from_ul),
            None => Ok(()),
        }
    }

    fn abort(&mut self) -> Result<()> {
        match self.association.take() {
            Some(association) => association.abort().map_err(DimseError::from_ul),
            None => Ok(()),
        }
    }
}

/// Largest PDV payload for an acceptor's maximum PDU length. An unlimited
/// acceptor (reported as `u32::MAX`) still gets PDUs of at most [`MAX_PDU`].
fn fragment_len(acceptor_max_pdu: u32) -> usize {
    acceptor_max_pdu
        .min(MAX_PDU)
        .saturating_sub(PDV_HEADER_LEN)
        .max(1) as usize
}

fn transfer_syntax(uid: &str) -> Result<&'static TransferSyntax> {
    let registry: &'static TransferSyntaxRegistry = &TransferSyntaxRegistry;
    registry
        .get(uid.trim_end_matches('\0'))
        .ok_or_else(|| DimseError::protocol(format!("unsupported transfer syntax {}", uid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_len_follows_acceptor() {
        assert_eq!(fragment_len(4096), 4090);
        assert_eq!(fragment_len(16384), 16378);
    }

    #[test]
    fn test_unlimited_acceptor_is_capped() {
        assert_eq!(fragment_len(u32::MAX), (MAX_PDU - PDV_HEADER_LEN) as usize);
    }

    #[test]
    fn test_known_transfer_syntaxes_resolve() {
        assert!(transfer_syntax(IMPLICIT_VR_LE).is_ok());
        assert!(transfer_syntax("1.2.840.10008.1.2.1\0").is_ok());
        assert!(transfer_syntax("1.2.3.4.5").is_err());
    }
}
