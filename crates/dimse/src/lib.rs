//! DIMSE (DICOM Message Service Element) service user
//!
//! This crate drives outbound DICOM associations for a desktop viewer or
//! bridge: one association per call, opened, exchanged on, and released
//! before the call returns.
//!
//! # Features
//! - Outbound DIMSE services (SCU): C-ECHO, C-FIND, C-MOVE, C-STORE
//! - Uniform [`ServiceResult`] outcomes; protocol failures never escape as panics
//! - Association release guaranteed on every exit path
//! - Pluggable link ([`link::Connector`]) and file codec ([`FileCodec`]) seams

pub mod association;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod scu;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use association::{Association, MoveOutcome};
pub use codec::{DicomFileCodec, FileCodec, LoadedInstance};
pub use config::{AeTitle, RemoteNode, ScuConfig};
pub use error::{DimseError, Result};
pub use link::UlConnector;
pub use scu::{DimseScu, ScuBuilder};
pub use types::{QueryCriteria, QueryMatch, ServiceResult, ServiceStatus, TransferProgress};

/// Port assumed when a remote node is given without one
pub const DEFAULT_DIMSE_PORT: u16 = 11112;

/// Maximum length of an AE title
pub const MAX_AE_TITLE_LEN: usize = 16;

/// Maximum length of a [`ServiceResult`] message, in characters
pub const MAX_MESSAGE_LEN: usize = 255;

/// Default maximum PDU length offered during negotiation
pub const DEFAULT_MAX_PDU: u32 = 16384;

/// Smallest maximum PDU length accepted in configuration
pub const MIN_PDU: u32 = 4096;

/// Largest maximum PDU length accepted in configuration; also caps outgoing P-DATA PDUs
pub const MAX_PDU: u32 = 131072;

/// Default per-exchange timeout
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;

/// Calling AE title used when none is configured
pub const DEFAULT_LOCAL_AET: &str = "PACSBRIDGE";
