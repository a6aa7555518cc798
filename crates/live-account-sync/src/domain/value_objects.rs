//! # Domain Value Objects
//!
//! Immutable value types: subjects, record kinds, sequence markers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_pubkey::{ParsePubkeyError, Pubkey, PUBKEY_BYTES};

use super::errors::ParseSubjectError;

/// Length of a subject identifier in bytes.
pub const SUBJECT_LEN: usize = PUBKEY_BYTES;

/// Identity of an observed remote record (an account address).
///
/// Displayed and parsed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Subject(Pubkey);

impl Subject {
    /// Wrap raw address bytes.
    pub const fn new_from_array(bytes: [u8; SUBJECT_LEN]) -> Self {
        Self(Pubkey::new_from_array(bytes))
    }

    /// Wrap an address.
    pub const fn from_pubkey(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    /// Underlying address.
    pub const fn pubkey(&self) -> &Pubkey {
        &self.0
    }

    /// Raw address bytes.
    pub const fn to_bytes(self) -> [u8; SUBJECT_LEN] {
        self.0.to_bytes()
    }

    /// Borrow the raw address bytes.
    pub const fn as_array(&self) -> &[u8; SUBJECT_LEN] {
        self.0.as_array()
    }
}

impl AsRef<[u8]> for Subject {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<[u8; SUBJECT_LEN]> for Subject {
    fn from(bytes: [u8; SUBJECT_LEN]) -> Self {
        Self::new_from_array(bytes)
    }
}

impl From<Pubkey> for Subject {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Subject> for Pubkey {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

impl TryFrom<&[u8]> for Subject {
    type Error = ParseSubjectError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; SUBJECT_LEN] = bytes
            .try_into()
            .map_err(|_| ParseSubjectError::InvalidLength)?;
        Ok(Self::new_from_array(array))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subject({self})")
    }
}

impl FromStr for Subject {
    type Err = ParseSubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pubkey = Pubkey::from_str(s).map_err(|e| match e {
            ParsePubkeyError::WrongSize => ParseSubjectError::InvalidLength,
            ParsePubkeyError::Invalid => ParseSubjectError::InvalidBase58,
        })?;
        Ok(Self(pubkey))
    }
}

impl Serialize for Subject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decode strategy for an observed record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Token account holding a balance of one mint.
    AccountState,
    /// Mint defining supply and decimals.
    MintState,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountState => f.write_str("account"),
            Self::MintState => f.write_str("mint"),
        }
    }
}

/// Ordering token attached to every push update (the slot it was observed at).
///
/// Used only for ordering decisions, never for identity.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SequenceMarker(pub u64);

impl SequenceMarker {
    /// Underlying slot number.
    pub const fn slot(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

impl From<u64> for SequenceMarker {
    fn from(slot: u64) -> Self {
        Self(slot)
    }
}

/// Raw push notification as delivered by a data source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdate {
    /// Raw record bytes after the change.
    pub data: Vec<u8>,
    /// Ordering marker of the change.
    pub marker: SequenceMarker,
}

impl AccountUpdate {
    /// Create a new update.
    pub fn new(data: Vec<u8>, marker: impl Into<SequenceMarker>) -> Self {
        Self {
            data,
            marker: marker.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_base58_roundtrip() {
        let subject: Subject = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".parse().unwrap();
        assert_eq!(subject.to_bytes()[0], 6);
        assert_eq!(
            subject.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
    }

    #[test]
    fn test_subject_wraps_pubkey() {
        let pubkey = Pubkey::new_from_array([9u8; 32]);
        let subject = Subject::from(pubkey);
        assert_eq!(subject.pubkey(), &pubkey);
        assert_eq!(subject.to_string(), pubkey.to_string());
        assert_eq!(Pubkey::from(subject), pubkey);
        assert_eq!(Subject::try_from(&[9u8; 32][..]), Ok(subject));
        assert_eq!(
            Subject::try_from(&[9u8; 31][..]),
            Err(ParseSubjectError::InvalidLength)
        );
    }

    #[test]
    fn test_default_subject_is_system_program() {
        assert_eq!(
            Subject::default().to_string(),
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn test_subject_parse_rejects_bad_input() {
        assert!(matches!(
            "0OIl".parse::<Subject>(),
            Err(ParseSubjectError::InvalidBase58)
        ));
        assert!(matches!(
            "3yZe7d".parse::<Subject>(),
            Err(ParseSubjectError::InvalidLength)
        ));
    }

    #[test]
    fn test_subject_serde_as_string() {
        let subject = Subject::new_from_array([0u8; 32]);
        let json = serde_json::to_string(&subject).unwrap();
        assert_eq!(json, "\"11111111111111111111111111111111\"");
        let back: Subject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, subject);
    }

    #[test]
    fn test_sequence_marker_ordering() {
        assert!(SequenceMarker(5) > SequenceMarker(3));
        assert_eq!(SequenceMarker::from(9).slot(), 9);
    }
}
