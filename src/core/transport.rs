//! Transport error classification
//!
//! Parses libgit2 transport errors into outcomes the sync state machine can
//! act on: a wrong passphrase is retried, a rejected key is reported with
//! upload instructions, a diverged branch goes through the merge fallback.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ShipitError};

/// The private key could not be unlocked
static PASSPHRASE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)wrong passphrase|invalid passphrase|incorrect passphrase|unable to (extract public key from|initialize) private key|bad decrypt",
    )
    .expect("Invalid regex pattern for passphrase failure detection")
});

/// The remote refused the presented key or token
static REJECTED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)failed to authenticate ssh session|permission denied \(publickey|authentication (required|failed|rejected)|remote rejected the credentials|too many redirects or authentication replays|status code: 40[13]",
    )
    .expect("Invalid regex pattern for credential rejection detection")
});

/// The remote branch moved and cannot be fast-forwarded
static NON_FAST_FORWARD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)non-fast-?forward|fetch first|not present locally|failed to update ref|cannot lock ref")
        .expect("Invalid regex pattern for non-fast-forward detection")
});

/// Classified result of a pull or push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    /// Refs were updated
    Updated,
    /// Nothing to transfer
    UpToDate,
    /// The SSH key passphrase was wrong
    InvalidPassphrase,
    /// The remote refused the key or token
    KeyRejected,
    /// Histories diverged
    NonFastForward,
    /// The branch does not exist on the remote yet
    RemoteBranchMissing,
}

/// Message used when the credential callback refuses to answer twice
pub const CREDENTIALS_REJECTED_MESSAGE: &str = "remote rejected the credentials";

/// Classify a transport error.
///
/// Recognised conditions become a `TransferResult`; anything else is
/// propagated as a git error.
pub fn classify_transport_error(err: git2::Error) -> Result<TransferResult> {
    classify_message(err.message())
        .or_else(|| (err.code() == git2::ErrorCode::Auth).then_some(TransferResult::KeyRejected))
        .ok_or(ShipitError::Git(err))
}

/// Classify a rejection reported per-ref by the remote after a push
pub fn classify_push_status(status: &str) -> Result<TransferResult> {
    if NON_FAST_FORWARD_PATTERN.is_match(status) {
        Ok(TransferResult::NonFastForward)
    } else {
        Err(ShipitError::Git(git2::Error::from_str(&format!(
            "remote refused the update: {}",
            status
        ))))
    }
}

fn classify_message(message: &str) -> Option<TransferResult> {
    // passphrase first: libssh2 reports it inside "failed to authenticate"
    if PASSPHRASE_PATTERN.is_match(message) {
        Some(TransferResult::InvalidPassphrase)
    } else if REJECTED_PATTERN.is_match(message) {
        Some(TransferResult::KeyRejected)
    } else if NON_FAST_FORWARD_PATTERN.is_match(message) {
        Some(TransferResult::NonFastForward)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_passphrase_detection() {
        let msg = "Failed to authenticate SSH session: Unable to extract public key from private key file: Wrong passphrase or invalid/unrecognized private key file format";
        assert_eq!(classify_message(msg), Some(TransferResult::InvalidPassphrase));
        assert_eq!(
            classify_message("Failed to authenticate SSH session: Unable to initialize private key from file"),
            Some(TransferResult::InvalidPassphrase)
        );
    }

    #[test]
    fn test_rejected_key_detection() {
        assert_eq!(
            classify_message("Failed to authenticate SSH session: Callback returned error"),
            Some(TransferResult::KeyRejected)
        );
        assert_eq!(
            classify_message(CREDENTIALS_REJECTED_MESSAGE),
            Some(TransferResult::KeyRejected)
        );
        assert_eq!(
            classify_message("unexpected http status code: 403"),
            Some(TransferResult::KeyRejected)
        );
    }

    #[test]
    fn test_non_fast_forward_detection() {
        assert_eq!(
            classify_message("cannot push non-fastforwardable reference"),
            Some(TransferResult::NonFastForward)
        );
        assert_eq!(
            classify_message("cannot push because a reference that you are trying to update on the remote contains commits that are not present locally: non-fast-forward"),
            Some(TransferResult::NonFastForward)
        );
        assert_eq!(
            classify_push_status("rejected (fetch first)").unwrap(),
            TransferResult::NonFastForward
        );
    }

    #[test]
    fn test_unrecognised_error_propagates() {
        let err = git2::Error::from_str("could not resolve host: github.com");
        assert!(matches!(classify_transport_error(err), Err(ShipitError::Git(_))));
        assert!(classify_push_status("pre-receive hook declined").is_err());
    }

    #[test]
    fn test_auth_code_is_rejection() {
        let err = git2::Error::new(
            git2::ErrorCode::Auth,
            git2::ErrorClass::Http,
            "request failed",
        );
        assert_eq!(
            classify_transport_error(err).unwrap(),
            TransferResult::KeyRejected
        );
    }
}
