#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;
use dimse::command::{field, DimseMessage, NO_DATASET, DATASET_PRESENT};
use dimse::link::{AssociationParameters, Connector, DimseLink, PresentationContext, IMPLICIT_VR_LE};
use dimse::{AeTitle, DimseError, DimseScu, FileCodec, LoadedInstance, RemoteNode, Result};

/// A request as the simulated peer saw it
#[derive(Debug, Clone)]
pub struct Received {
    pub command: InMemDicomObject,
    pub dataset: Option<InMemDicomObject>,
}

impl Received {
    pub fn u16(&self, tag: dicom_core::Tag) -> u16 {
        self.command.get(tag).unwrap().to_int::<u16>().unwrap()
    }

    pub fn command_str(&self, tag: dicom_core::Tag) -> String {
        text(&self.command, tag)
    }

    pub fn dataset_str(&self, tag: dicom_core::Tag) -> Option<String> {
        let dataset = self.dataset.as_ref()?;
        dataset.get(tag)?;
        Some(text(dataset, tag))
    }
}

pub fn text(obj: &InMemDicomObject, tag: dicom_core::Tag) -> String {
    obj.get(tag)
        .map(|e| e.to_str().unwrap().trim_end_matches(['\0', ' ']).to_string())
        .unwrap_or_default()
}

type Responder = Box<dyn Fn(&Received) -> Vec<DimseMessage> + Send + Sync>;

#[derive(Default)]
struct PeerState {
    opened: usize,
    released: usize,
    aborted: usize,
    requests: Vec<Received>,
    negotiated: Vec<AssociationParameters>,
}

/// Scripted peer standing in for a remote PACS.
#[derive(Clone)]
pub struct SimPeer {
    state: Arc<Mutex<PeerState>>,
    responder: Arc<Responder>,
    accept_context: bool,
    refuse_association: bool,
}

impl SimPeer {
    pub fn new(responder: impl Fn(&Received) -> Vec<DimseMessage> + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::default(),
            responder: Arc::new(Box::new(responder)),
            accept_context: true,
            refuse_association: false,
        }
    }

    pub fn rejecting_contexts(mut self) -> Self {
        self.accept_context = false;
        self
    }

    pub fn refusing_associations(mut self) -> Self {
        self.refuse_association = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.released + state.aborted
    }

    pub fn released(&self) -> usize {
        self.state.lock().unwrap().released
    }

    pub fn aborted(&self) -> usize {
        self.state.lock().unwrap().aborted
    }

    pub fn requests(&self) -> Vec<Received> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn negotiated(&self) -> Vec<AssociationParameters> {
        self.state.lock().unwrap().negotiated.clone()
    }

    pub fn scu(&self) -> DimseScu {
        self.scu_with_codec(StaticCodec::default())
    }

    pub fn scu_with_codec(&self, codec: StaticCodec) -> DimseScu {
        DimseScu::with_parts(Arc::new(self.clone()), Arc::new(codec), dimse::DEFAULT_MAX_PDU)
    }
}

impl Connector for SimPeer {
    fn negotiate(&self, params: &AssociationParameters) -> Result<Box<dyn DimseLink>> {
        if self.refuse_association {
            return Err(DimseError::AssociationRejected("called AE title not recognized".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.opened += 1;
        state.negotiated.push(params.clone());

        let contexts = if self.accept_context {
            vec![PresentationContext {
                id: 1,
                abstract_syntax: params.abstract_syntax.clone(),
                transfer_syntax: IMPLICIT_VR_LE.to_string(),
            }]
        } else {
            Vec::new()
        };
        Ok(Box::new(SimLink {
            peer: self.clone(),
            contexts,
            queue: VecDeque::new(),
            open: true,
        }))
    }
}

struct SimLink {
    peer: SimPeer,
    contexts: Vec<PresentationContext>,
    queue: VecDeque<DimseMessage>,
    open: bool,
}

impl DimseLink for SimLink {
    fn accepted_contexts(&self) -> &[PresentationContext] {
        &self.contexts
    }

    fn send(
        &mut self,
        _context: &PresentationContext,
        command: &InMemDicomObject,
        dataset: Option<&InMemDicomObject>,
    ) -> Result<()> {
        let request = Received {
            command: command.clone(),
            dataset: dataset.cloned(),
        };
        self.queue.extend((self.peer.responder)(&request));
        self.peer.state.lock().unwrap().requests.push(request);
        Ok(())
    }

    fn receive(&mut self) -> Result<DimseMessage> {
        self.queue
            .pop_front()
            .ok_or_else(|| DimseError::Timeout("simulated peer has nothing to say".into()))
    }

    fn release(&mut self) -> Result<()> {
        assert!(self.open, "link released twice");
        self.open = false;
        self.peer.state.lock().unwrap().released += 1;
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        assert!(self.open, "link aborted after close");
        self.open = false;
        self.peer.state.lock().unwrap().aborted += 1;
        Ok(())
    }
}

/// Codec serving in-memory instances keyed by file name; unknown names fail
#[derive(Default, Clone)]
pub struct StaticCodec {
    instances: HashMap<PathBuf, LoadedInstance>,
}

impl StaticCodec {
    pub fn with_instance(mut self, path: impl Into<PathBuf>, sop_class: &str, sop_instance: &str) -> Self {
        let mut dataset = InMemDicomObject::new_empty();
        dataset.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(sop_class)));
        dataset.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(sop_instance),
        ));
        self.instances.insert(
            path.into(),
            LoadedInstance {
                sop_class_uid: sop_class.to_string(),
                sop_instance_uid: sop_instance.to_string(),
                dataset,
            },
        );
        self
    }
}

impl FileCodec for StaticCodec {
    fn load(&self, path: &Path) -> Result<LoadedInstance> {
        self.instances
            .get(path)
            .cloned()
            .ok_or_else(|| DimseError::DicomParsing(format!("{}: not a DICOM file", path.display())))
    }
}

fn us(tag: dicom_core::Tag, value: u16) -> InMemElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

/// Build a response command set answering `request`.
pub fn response(request: &Received, command_field: u16, status: u16, dataset: Option<InMemDicomObject>) -> DimseMessage {
    let message_id = request.u16(tags::MESSAGE_ID);
    let data_set_type = if dataset.is_some() { DATASET_PRESENT } else { NO_DATASET };
    let command = InMemDicomObject::command_from_element_iter([
        us(tags::COMMAND_FIELD, command_field),
        us(tags::MESSAGE_ID_BEING_RESPONDED_TO, message_id),
        us(tags::COMMAND_DATA_SET_TYPE, data_set_type),
        us(tags::STATUS, status),
    ]);
    DimseMessage::new(command, dataset)
}

/// C-MOVE response carrying sub-operation counters
pub fn move_response(request: &Received, status: u16, remaining: u16, completed: u16, failed: u16) -> DimseMessage {
    let mut message = response(request, field::C_MOVE_RSP, status, None);
    message.command.put(us(tags::NUMBER_OF_REMAINING_SUBOPERATIONS, remaining));
    message.command.put(us(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS, completed));
    message.command.put(us(tags::NUMBER_OF_FAILED_SUBOPERATIONS, failed));
    message
}

/// STUDY level identifier as a PACS would return it
pub fn study(patient_id: &str, study_uid: &str, description: &str) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from(patient_id)));
    obj.put(DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from(study_uid)));
    obj.put(DataElement::new(tags::STUDY_DESCRIPTION, VR::LO, PrimitiveValue::from(description)));
    obj
}

pub fn local() -> AeTitle {
    AeTitle::new("VIEWER").unwrap()
}

pub fn node() -> RemoteNode {
    RemoteNode::new(AeTitle::new("PACS").unwrap(), "pacs.test", 104)
}
