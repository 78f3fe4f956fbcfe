//! Association lifecycle and DIMSE exchanges
//!
//! An [`Association`] binds one negotiated link to one remote node for the
//! duration of a single workflow call. It is released exactly once: either
//! explicitly through [`Association::close`] or, on any other exit path
//! (early return, `?`, panic in a callback), by its `Drop` impl.

use std::time::Instant;

use dicom_object::InMemDicomObject;
use tracing::{debug, info, span, warn, Level};
use uuid::Uuid;

use crate::command::{self, field, DimseMessage};
use crate::config::{exchange_timeout, AeTitle, RemoteNode};
use crate::error::{DimseError, Result};
use crate::link::{AssociationParameters, Connector, DimseLink, PresentationContext, PROPOSED_TRANSFER_SYNTAXES};
use crate::types::{DimseStatus, TransferProgress};

/// Final outcome of a C-MOVE exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub status: u16,
    /// Counters from the final response, or the last pending one
    pub progress: TransferProgress,
}

/// A negotiated session with one remote node
pub struct Association {
    id: Uuid,
    peer: String,
    link: Option<Box<dyn DimseLink>>,
    contexts: Vec<PresentationContext>,
    next_message_id: u16,
}

impl Association {
    /// Negotiate an association proposing a single presentation context for
    /// `abstract_syntax`.
    ///
    /// Fails with [`DimseError::PresentationContextRejected`] when the peer
    /// accepts the association but not the context; the half-open session is
    /// aborted before returning.
    pub fn open(
        connector: &dyn Connector,
        local: &AeTitle,
        node: &RemoteNode,
        abstract_syntax: &str,
        timeout_seconds: u32,
        max_pdu: u32,
    ) -> Result<Self> {
        node.validate()?;

        let params = AssociationParameters {
            calling_ae: local.clone(),
            called_ae: node.ae_title.clone(),
            peer_address: node.address(),
            abstract_syntax: abstract_syntax.to_string(),
            transfer_syntaxes: PROPOSED_TRANSFER_SYNTAXES.iter().map(|ts| ts.to_string()).collect(),
            timeout: exchange_timeout(timeout_seconds),
            max_pdu,
        };

        let started = Instant::now();
        let link = connector.negotiate(&params).map_err(|e| match params.timeout {
            // A socket error surfacing once the deadline has passed is the deadline.
            Some(deadline) if !e.is_timeout() && started.elapsed() >= deadline => {
                DimseError::Timeout(e.to_string())
            }
            _ => e,
        })?;
        let contexts = link
            .accepted_contexts()
            .iter()
            .filter(|pc| pc.abstract_syntax == abstract_syntax)
            .cloned()
            .collect::<Vec<_>>();

        let mut association = Association {
            id: Uuid::new_v4(),
            peer: node.to_string(),
            link: Some(link),
            contexts,
            next_message_id: 1,
        };

        if association.contexts.is_empty() {
            warn!(
                "Peer {} accepted no presentation context for {}",
                association.peer, abstract_syntax
            );
            association.abort();
            return Err(DimseError::PresentationContextRejected);
        }

        info!(
            association = %association.id,
            "Association established with {} ({})", association.peer, abstract_syntax
        );
        Ok(association)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Accepted presentation context for an abstract syntax, if any
    pub fn context_for(&self, abstract_syntax: &str) -> Option<&PresentationContext> {
        self.contexts
            .iter()
            .find(|pc| pc.abstract_syntax == abstract_syntax)
    }

    /// Next message id of this association; ids never repeat within one
    /// session until the 16-bit space wraps, and 0 is skipped.
    pub fn next_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = match self.next_message_id.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        id
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Gracefully release the association, aborting if the release fails.
    ///
    /// Never fails and is a no-op on an already closed association.
    pub fn close(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        match link.release() {
            Ok(()) => info!(association = %self.id, "Association with {} released", self.peer),
            Err(e) => {
                warn!(
                    association = %self.id,
                    "Release of association with {} failed: {}; aborting", self.peer, e
                );
                if let Err(e) = link.abort() {
                    debug!(association = %self.id, "Abort after failed release also failed: {}", e);
                }
            }
        }
    }

    fn abort(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.abort() {
                debug!(association = %self.id, "Abort of association with {} failed: {}", self.peer, e);
            }
        }
    }

    fn link(&mut self) -> Result<&mut Box<dyn DimseLink>> {
        self.link
            .as_mut()
            .ok_or_else(|| DimseError::protocol("association is closed"))
    }

    fn require_context(&self, abstract_syntax: &str) -> Result<PresentationContext> {
        self.context_for(abstract_syntax)
            .cloned()
            .ok_or(DimseError::PresentationContextRejected)
    }

    /// C-ECHO; returns the response status
    pub fn echo(&mut self, sop_class_uid: &str) -> Result<u16> {
        let context = self.require_context(sop_class_uid)?;
        let message_id = self.next_message_id();
        let _span = span!(Level::DEBUG, "c_echo", association = %self.id, message_id).entered();

        let link = self.link()?;
        link.send(&context, &command::echo_rq(message_id, sop_class_uid), None)?;
        let response = link.receive()?;
        response.expect_response(field::C_ECHO_RSP, message_id)?;
        let status = response.status_code()?;
        debug!("C-ECHO response status 0x{:04x}", status);
        Ok(status)
    }

    /// C-FIND; `on_pending` sees every pending response carrying an
    /// identifier, in arrival order. Returns the final status.
    pub fn find(
        &mut self,
        sop_class_uid: &str,
        identifier: &InMemDicomObject,
        mut on_pending: impl FnMut(&InMemDicomObject),
    ) -> Result<u16> {
        let context = self.require_context(sop_class_uid)?;
        let message_id = self.next_message_id();
        let _span = span!(Level::DEBUG, "c_find", association = %self.id, message_id).entered();

        let link = self.link()?;
        link.send(
            &context,
            &command::find_rq(message_id, sop_class_uid),
            Some(identifier),
        )?;

        loop {
            let response = link.receive()?;
            response.expect_response(field::C_FIND_RSP, message_id)?;
            let status = response.status_code()?;
            if !DimseStatus::from_code(status).is_pending() {
                debug!("C-FIND final status 0x{:04x}", status);
                return Ok(status);
            }
            match &response.dataset {
                Some(dataset) => on_pending(dataset),
                None => debug!("Pending C-FIND response without identifier ignored"),
            }
        }
    }

    /// C-MOVE; `on_progress` sees the sub-operation counters of every
    /// pending response, in arrival order.
    pub fn retrieve(
        &mut self,
        sop_class_uid: &str,
        identifier: &InMemDicomObject,
        destination: &AeTitle,
        mut on_progress: impl FnMut(TransferProgress),
    ) -> Result<MoveOutcome> {
        let context = self.require_context(sop_class_uid)?;
        let message_id = self.next_message_id();
        let _span = span!(Level::DEBUG, "c_move", association = %self.id, message_id).entered();

        let link = self.link()?;
        link.send(
            &context,
            &command::move_rq(message_id, sop_class_uid, destination.as_str()),
            Some(identifier),
        )?;

        let mut progress = TransferProgress::default();
        loop {
            let response: DimseMessage = link.receive()?;
            response.expect_response(field::C_MOVE_RSP, message_id)?;
            let status = response.status_code()?;
            if let Some(counters) = response.sub_operations() {
                progress = counters;
            }
            if DimseStatus::from_code(status).is_pending() {
                on_progress(progress);
                continue;
            }
            debug!("C-MOVE final status 0x{:04x}", status);
            return Ok(MoveOutcome { status, progress });
        }
    }

    /// C-STORE of one dataset; returns the response status
    pub fn store(
        &mut self,
        context: &PresentationContext,
        sop_class_uid: &str,
        sop_instance_uid: &str,
        dataset: &InMemDicomObject,
    ) -> Result<u16> {
        let message_id = self.next_message_id();
        let _span = span!(Level::DEBUG, "c_store", association = %self.id, message_id).entered();

        let link = self.link()?;
        link.send(
            context,
            &command::store_rq(message_id, sop_class_uid, sop_instance_uid),
            Some(dataset),
        )?;
        let response = link.receive()?;
        response.expect_response(field::C_STORE_RSP, message_id)?;
        let status = response.status_code()?;
        debug!("C-STORE of {} answered 0x{:04x}", sop_instance_uid, status);
        Ok(status)
    }
}

impl Drop for Association {
    fn drop(&mut self) {
        if self.link.is_some() {
            debug!(association = %self.id, "Association dropped while open; releasing");
            self.close();
        }
    }
}

impl std::fmt::Debug for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("open", &self.link.is_some())
            .field("contexts", &self.contexts)
            .finish()
    }
}
