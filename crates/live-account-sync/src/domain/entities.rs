//! # Domain Entities
//!
//! Decoded record types and the observation view handed to callers.

use serde::{Deserialize, Serialize};

use super::errors::SyncError;
use super::value_objects::{RecordKind, SequenceMarker, Subject};

/// Decoded token account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Address of this account (the observed subject).
    pub address: Subject,
    /// Mint this account holds a balance of.
    pub mint: Subject,
    /// Owner allowed to move the balance.
    pub owner: Subject,
    /// Balance in base units.
    pub amount: u64,
    /// Delegate allowed to move up to `delegated_amount`.
    pub delegate: Option<Subject>,
    /// Delegated allowance; zero when there is no delegate.
    pub delegated_amount: u64,
    /// Account has been initialized.
    pub is_initialized: bool,
    /// Account is frozen by the mint's freeze authority.
    pub is_frozen: bool,
    /// Account wraps native SOL.
    pub is_native: bool,
    /// Rent-exempt reserve, present only for native accounts.
    pub rent_exempt_reserve: Option<u64>,
    /// Authority allowed to close the account.
    pub close_authority: Option<Subject>,
}

/// Decoded mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintState {
    /// Authority allowed to mint new tokens.
    pub mint_authority: Option<Subject>,
    /// Total supply in base units.
    pub supply: u64,
    /// Decimal places of the base unit.
    pub decimals: u8,
    /// Mint has been initialized.
    pub is_initialized: bool,
    /// Authority allowed to freeze accounts.
    pub freeze_authority: Option<Subject>,
}

/// A decoded record of either kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// Token account.
    Account(AccountState),
    /// Mint.
    Mint(MintState),
}

impl Record {
    /// Kind tag of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Account(_) => RecordKind::AccountState,
            Self::Mint(_) => RecordKind::MintState,
        }
    }

    /// Token account view, if this is one.
    pub fn as_account(&self) -> Option<&AccountState> {
        match self {
            Self::Account(account) => Some(account),
            Self::Mint(_) => None,
        }
    }

    /// Mint view, if this is one.
    pub fn as_mint(&self) -> Option<&MintState> {
        match self {
            Self::Mint(mint) => Some(mint),
            Self::Account(_) => None,
        }
    }
}

impl From<AccountState> for Record {
    fn from(account: AccountState) -> Self {
        Self::Account(account)
    }
}

impl From<MintState> for Record {
    fn from(mint: MintState) -> Self {
        Self::Mint(mint)
    }
}

/// Point-in-time view of one observation.
///
/// `Default` is the idle view: nothing observed, nothing loading.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservationState {
    /// Subject of the current lifecycle, if any.
    pub subject: Option<Subject>,
    /// A baseline fetch for `subject` is outstanding.
    pub loading: bool,
    /// Latest accepted record.
    pub value: Option<Record>,
    /// Most recent error of the current lifecycle.
    pub error: Option<SyncError>,
    /// Marker of the last accepted push update.
    pub last_sequence: Option<SequenceMarker>,
}

impl ObservationState {
    /// Fresh state for a lifecycle whose baseline fetch just started.
    pub fn loading(subject: Subject) -> Self {
        Self {
            subject: Some(subject),
            loading: true,
            ..Self::default()
        }
    }

    /// Token account view of `value`.
    pub fn account(&self) -> Option<&AccountState> {
        self.value.as_ref().and_then(Record::as_account)
    }

    /// Mint view of `value`.
    pub fn mint(&self) -> Option<&MintState> {
        self.value.as_ref().and_then(Record::as_mint)
    }
}

/// View of a resolve-then-observe composition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DerivedObservationState {
    /// Address the derivation resolved to, once it has.
    pub resolved_subject: Option<Subject>,
    /// Observation of the resolved address; carries derivation errors too.
    pub state: ObservationState,
}
