//! DIMSE status mapping
//!
//! Translates low-level outcomes into the uniform [`ServiceResult`] handed
//! back by every workflow.
//!
//! # Status Code Mapping
//!
//! DIMSE status codes follow these conventions (PS3.7 Annex C):
//! - `0x0000`: Success
//! - `0x0001`, `0x0107`, `0x0116`, `0xB000-0xBFFF`: Warning
//! - `0xA700-0xA7FF`: Refused, out of resources
//! - `0xA900-0xA9FF`: Dataset does not match SOP Class
//! - `0xC000-0xCFFF`: Cannot understand
//! - `0xFE00`: Cancel
//! - `0xFF00`, `0xFF01`: Pending (C-FIND, C-MOVE)
//!
//! # Usage
//!
//! ```
//! use dimse::status;
//! use dimse::types::ServiceStatus;
//!
//! let result = status::from_protocol_status(0xA000);
//! assert_eq!(result.status, ServiceStatus::Error);
//! assert!(result.message.contains("a000"));
//! ```

use crate::error::DimseError;
use crate::types::{DimseStatus, ServiceResult, ServiceStatus};

/// Map a low-level outcome to a result.
///
/// Success yields `Ok` with an empty message. Failure yields
/// `"<operation> failed: <cause>"`, with status `Timeout` when the cause is
/// an exhausted deadline and `Error` otherwise.
pub fn to_result<T>(outcome: &Result<T, DimseError>, operation: &str) -> ServiceResult {
    match outcome {
        Ok(_) => ServiceResult::ok("", 0),
        Err(err) => error_result(err, operation),
    }
}

/// Map a failure to a result, see [`to_result`].
pub fn error_result(err: &DimseError, operation: &str) -> ServiceResult {
    let status = if err.is_timeout() {
        ServiceStatus::Timeout
    } else {
        ServiceStatus::Error
    };
    ServiceResult::new(status, format!("{} failed: {}", operation, err), 0)
}

/// Map a raw DIMSE status code to a result.
///
/// Only `0x0000` is `Ok`; everything else is an `Error` carrying the code.
pub fn from_protocol_status(code: u16) -> ServiceResult {
    if code == 0 {
        ServiceResult::ok("", 0)
    } else {
        ServiceResult::new(
            ServiceStatus::Error,
            format!("DIMSE status 0x{:04x}", code),
            code,
        )
    }
}

/// Check if a status indicates success (including warnings)
pub fn is_successful_status(status: &DimseStatus) -> bool {
    matches!(status, DimseStatus::Success | DimseStatus::Warning(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_outcome_has_empty_message() {
        let outcome: Result<(), DimseError> = Ok(());
        let result = to_result(&outcome, "Association");
        assert_eq!(result.status, ServiceStatus::Ok);
        assert!(result.message.is_empty());
        assert_eq!(result.protocol_status, 0);
    }

    #[test]
    fn test_error_outcome_names_operation() {
        let outcome: Result<(), DimseError> = Err(DimseError::PresentationContextRejected);
        let result = to_result(&outcome, "Association");
        assert_eq!(result.status, ServiceStatus::Error);
        assert_eq!(result.message, "Association failed: Presentation context rejected");
    }

    #[test]
    fn test_timeout_outcome() {
        let outcome: Result<(), DimseError> = Err(DimseError::Timeout("no answer".into()));
        let result = to_result(&outcome, "C-FIND");
        assert_eq!(result.status, ServiceStatus::Timeout);
        assert!(result.message.starts_with("C-FIND failed: "));
    }

    #[test]
    fn test_protocol_status_success() {
        let result = from_protocol_status(0);
        assert!(result.is_ok());
        assert_eq!(result.protocol_status, 0);
    }

    #[test]
    fn test_protocol_status_failure_is_hex() {
        let result = from_protocol_status(0xA000);
        assert_eq!(result.status, ServiceStatus::Error);
        assert_eq!(result.protocol_status, 0xA000);
        assert!(result.message.contains("0xa000"));

        let result = from_protocol_status(0x0110);
        assert!(result.message.contains("0x0110"));
    }

    #[test]
    fn test_is_successful_status() {
        assert!(is_successful_status(&DimseStatus::Success));
        assert!(is_successful_status(&DimseStatus::Warning(0xB000)));
        assert!(!is_successful_status(&DimseStatus::Failure(0x0110)));
        assert!(!is_successful_status(&DimseStatus::Pending));
    }
}
