//! Upper-layer link abstraction
//!
//! The association manager talks to the network through two small traits:
//! a [`Connector`] negotiates a session, and the resulting [`DimseLink`]
//! moves whole DIMSE messages across it. The production implementation is
//! [`UlConnector`] over `dicom-ul`; tests substitute a scripted peer.

mod ul;

use std::time::Duration;

use dicom_object::InMemDicomObject;

use crate::command::DimseMessage;
use crate::config::AeTitle;
use crate::error::Result;

pub use ul::UlConnector;

/// Implicit VR Little Endian
pub const IMPLICIT_VR_LE: &str = "1.2.840.10008.1.2";
/// Explicit VR Little Endian
pub const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
/// Explicit VR Big Endian
pub const EXPLICIT_VR_BE: &str = "1.2.840.10008.1.2.2";

/// Transfer syntaxes proposed with every presentation context, most
/// preferred first.
pub const PROPOSED_TRANSFER_SYNTAXES: [&str; 3] = [IMPLICIT_VR_LE, EXPLICIT_VR_LE, EXPLICIT_VR_BE];

/// Everything needed to request one association
#[derive(Debug, Clone)]
pub struct AssociationParameters {
    pub calling_ae: AeTitle,
    pub called_ae: AeTitle,
    /// Peer address in `host:port` form
    pub peer_address: String,
    pub abstract_syntax: String,
    pub transfer_syntaxes: Vec<String>,
    /// Read/write deadline; `None` blocks indefinitely
    pub timeout: Option<Duration>,
    pub max_pdu: u32,
}

/// A presentation context the peer accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContext {
    pub id: u8,
    pub abstract_syntax: String,
    pub transfer_syntax: String,
}

/// Negotiates associations with a peer.
pub trait Connector: Send + Sync {
    /// Request an association. Succeeds whenever the peer answers with
    /// A-ASSOCIATE-AC, even if no presentation context was accepted.
    fn negotiate(&self, params: &AssociationParameters) -> Result<Box<dyn DimseLink>>;
}

/// An established session able to exchange DIMSE messages.
pub trait DimseLink {
    /// Presentation contexts accepted during negotiation
    fn accepted_contexts(&self) -> &[PresentationContext];

    /// Send one message on the given presentation context.
    fn send(
        &mut self,
        context: &PresentationContext,
        command: &InMemDicomObject,
        dataset: Option<&InMemDicomObject>,
    ) -> Result<()>;

    /// Block until the next complete message arrives.
    fn receive(&mut self) -> Result<DimseMessage>;

    /// Graceful A-RELEASE. The link is unusable afterwards.
    fn release(&mut self) -> Result<()>;

    /// A-ABORT. The link is unusable afterwards.
    fn abort(&mut self) -> Result<()>;
}
