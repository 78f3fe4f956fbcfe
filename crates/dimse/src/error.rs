//! Error types for DIMSE operations

use thiserror::Error;

/// Result type alias for DIMSE operations
pub type Result<T> = std::result::Result<T, DimseError>;

/// Error types that can occur below the service workflows.
///
/// Workflows never hand these to callers directly; the status mapper folds
/// them into a [`ServiceResult`](crate::types::ServiceResult).
#[derive(Error, Debug)]
pub enum DimseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("DICOM parsing error: {0}")]
    DicomParsing(String),

    #[error("DICOM object error: {0}")]
    DicomObject(String),

    #[error("DICOM UL error: {0}")]
    DicomUl(String),

    #[error("Association rejected: {0}")]
    AssociationRejected(String),

    #[error("Presentation context rejected")]
    PresentationContextRejected,

    #[error("Invalid AE Title: {0}")]
    InvalidAeTitle(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("DIMSE operation failed: {0}")]
    OperationFailed(String),
}

impl DimseError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid parameters error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new operation failed error
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Classify an upper-layer failure, detecting socket timeouts anywhere in
    /// its source chain.
    pub fn from_ul<E>(err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        if is_timeout_chain(&err) {
            Self::Timeout(err.to_string())
        } else {
            Self::DicomUl(err.to_string())
        }
    }

    /// Check if this error is an exhausted deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            DimseError::Timeout(_) => true,
            DimseError::Network(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

fn is_timeout_chain(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("could not receive response")]
    struct Wrapped {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_timeout_detected_in_source_chain() {
        let err = Wrapped {
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block"),
        };
        assert!(DimseError::from_ul(err).is_timeout());
    }

    #[test]
    fn test_other_ul_errors_are_not_timeouts() {
        let err = Wrapped {
            source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        };
        let mapped = DimseError::from_ul(err);
        assert!(!mapped.is_timeout());
        assert!(matches!(mapped, DimseError::DicomUl(_)));
    }

    #[test]
    fn test_presentation_context_message() {
        assert_eq!(
            DimseError::PresentationContextRejected.to_string(),
            "Presentation context rejected"
        );
    }
}
