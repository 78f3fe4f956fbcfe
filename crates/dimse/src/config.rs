//! Configuration types for DIMSE services

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DimseError;
use crate::{
    DEFAULT_DIMSE_PORT, DEFAULT_MAX_PDU, DEFAULT_TIMEOUT_SECONDS, MAX_AE_TITLE_LEN, MAX_PDU,
    MIN_PDU,
};

/// A validated Application Entity Title.
///
/// AE titles are at most 16 characters of printable ASCII without
/// backslashes. Leading and trailing spaces are not significant and are
/// stripped. Overlong titles are rejected, never truncated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AeTitle(String);

impl AeTitle {
    pub fn new(value: impl AsRef<str>) -> Result<Self, DimseError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DimseError::InvalidAeTitle("AE title cannot be empty".into()));
        }
        if trimmed.len() > MAX_AE_TITLE_LEN {
            return Err(DimseError::InvalidAeTitle(format!(
                "'{}' exceeds {} characters",
                trimmed, MAX_AE_TITLE_LEN
            )));
        }
        if let Some(c) = trimmed.chars().find(|c| !c.is_ascii() || c.is_ascii_control() || *c == '\\') {
            return Err(DimseError::InvalidAeTitle(format!(
                "'{}' contains invalid character {:?}",
                trimmed, c
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AeTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AeTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AeTitle {
    type Err = DimseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AeTitle {
    type Error = DimseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AeTitle> for String {
    fn from(value: AeTitle) -> Self {
        value.0
    }
}

/// Configuration for a remote DICOM node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Remote Application Entity Title
    pub ae_title: AeTitle,

    /// Remote host address
    pub host: String,

    /// Remote port
    pub port: u16,
}

impl RemoteNode {
    /// Create a new remote node
    pub fn new(ae_title: AeTitle, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title,
            host: host.into(),
            port,
        }
    }

    /// Peer network address in `host:port` form
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the remote node configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.host.trim().is_empty() {
            return Err(DimseError::invalid("remote host cannot be empty"));
        }

        if self.port == 0 {
            return Err(DimseError::invalid("remote port must be greater than 0"));
        }

        Ok(())
    }
}

impl fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.ae_title, self.host, self.port)
    }
}

/// Parses `AET@host:port`, or `AET@host` for the default DICOM port.
impl FromStr for RemoteNode {
    type Err = DimseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (aet, address) = s
            .split_once('@')
            .ok_or_else(|| DimseError::config(format!("expected AET@host:port, got '{}'", s)))?;
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| DimseError::config(format!("invalid port '{}': {}", port, e)))?;
                (host, port)
            }
            None => (address, DEFAULT_DIMSE_PORT),
        };
        let node = RemoteNode::new(AeTitle::new(aet)?, host, port);
        node.validate()?;
        Ok(node)
    }
}

/// Settings shared by every SCU call made through a [`DimseScu`](crate::DimseScu).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScuConfig {
    /// Local Application Entity Title (also the C-MOVE destination)
    #[serde(default = "default_local_aet")]
    pub local_aet: AeTitle,

    /// Per-exchange timeout in seconds; 0 disables the deadline
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,

    /// Maximum PDU size we are willing to receive, in bytes
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,
}

impl Default for ScuConfig {
    fn default() -> Self {
        Self {
            local_aet: default_local_aet(),
            timeout_seconds: default_timeout_seconds(),
            max_pdu: default_max_pdu(),
        }
    }
}

impl ScuConfig {
    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(MIN_PDU..=MAX_PDU).contains(&self.max_pdu) {
            return Err(DimseError::config(format!(
                "Max PDU size must be between {} and {} bytes",
                MIN_PDU, MAX_PDU
            )));
        }
        Ok(())
    }
}

/// Deadline applied to association negotiation and to every DIMSE exchange.
///
/// Zero seconds means no deadline: reads block until the peer answers or the
/// connection is closed.
pub fn exchange_timeout(timeout_seconds: u32) -> Option<Duration> {
    match timeout_seconds {
        0 => None,
        secs => Some(Duration::from_secs(u64::from(secs))),
    }
}

fn default_local_aet() -> AeTitle {
    AeTitle(crate::DEFAULT_LOCAL_AET.to_string())
}

fn default_timeout_seconds() -> u32 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_max_pdu() -> u32 {
    DEFAULT_MAX_PDU
}
