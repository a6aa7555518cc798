//! # Domain Errors
//!
//! Error types for live account observation.
//!
//! Every error an observation can hit is captured in its published state;
//! none of these ever escape the driver task as a panic.

use thiserror::Error;

use super::value_objects::RecordKind;

/// Errors surfaced through `ObservationState::error`.
///
/// `Display` renders only the underlying message for `Read` and
/// `Derivation`, so a transport failure reading "timeout" shows up to the
/// caller as exactly "timeout".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Transport or lookup failure on the baseline read.
    #[error("{0}")]
    Read(String),

    /// Baseline bytes were malformed for the declared record kind.
    #[error("{0}")]
    Decode(DecodeError),

    /// A push update carried bytes that failed to decode.
    ///
    /// Reported like [`SyncError::Decode`] but never clears a published value.
    #[error("{0}")]
    SubscriptionDecode(DecodeError),

    /// Subordinate address resolution failed.
    #[error("{0}")]
    Derivation(String),
}

impl SyncError {
    /// Build a read error from any displayable cause.
    pub fn read(cause: impl std::fmt::Display) -> Self {
        Self::Read(cause.to_string())
    }

    /// Build a derivation error from any displayable cause.
    pub fn derivation(cause: impl std::fmt::Display) -> Self {
        Self::Derivation(cause.to_string())
    }

    /// True for errors raised by decoding, baseline or push.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::SubscriptionDecode(_))
    }
}

/// Binary layout decode failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer length does not match the fixed layout.
    #[error("Invalid {kind} size: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Record kind being decoded
        kind: RecordKind,
        /// Layout size
        expected: usize,
        /// Actual buffer size
        got: usize,
    },

    /// Optional-field tag was neither 0 nor 1.
    #[error("Invalid option tag {tag} for field `{field}`")]
    InvalidOptionTag {
        /// Field name
        field: &'static str,
        /// Raw tag value
        tag: u32,
    },

    /// Account state byte outside {uninitialized, initialized, frozen}.
    #[error("Invalid account state: {0}")]
    InvalidAccountState(u8),
}

/// Failure parsing a base58 subject string.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseSubjectError {
    /// Not valid base58.
    #[error("Invalid base58 string")]
    InvalidBase58,

    /// Not 32 bytes.
    #[error("Invalid subject length")]
    InvalidLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_displays_message_only() {
        let err = SyncError::read("timeout");
        assert_eq!(err.to_string(), "timeout");
    }

    #[test]
    fn test_invalid_length_error() {
        let err = DecodeError::InvalidLength {
            kind: RecordKind::MintState,
            expected: 82,
            got: 10,
        };
        assert_eq!(
            err.to_string(),
            "Invalid mint size: expected 82 bytes, got 10"
        );
    }

    #[test]
    fn test_is_decode() {
        let decode = DecodeError::InvalidAccountState(7);
        assert!(SyncError::Decode(decode.clone()).is_decode());
        assert!(SyncError::SubscriptionDecode(decode).is_decode());
        assert!(!SyncError::derivation("boom").is_decode());
    }
}
