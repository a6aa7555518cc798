//! # SPL Token Codec
//!
//! Fixed-layout decoding of legacy SPL token accounts and mints.
//!
//! ```text
//! Account (165 bytes)                 Mint (82 bytes)
//! ├── [0..32]    mint                 ├── [0..36]   mint_authority  COption<Pubkey>
//! ├── [32..64]   owner                ├── [36..44]  supply          u64
//! ├── [64..72]   amount      u64      ├── [44]      decimals        u8
//! ├── [72..108]  delegate    COption  ├── [45]      is_initialized  u8
//! ├── [108]      state       u8       └── [46..82]  freeze_authority COption<Pubkey>
//! ├── [109..121] is_native   COption<u64>
//! ├── [121..129] delegated_amount u64
//! └── [129..165] close_authority COption<Pubkey>
//! ```
//!
//! All integers are little-endian; `COption` tags are u32 (0 = None, 1 = Some).

use crate::domain::{AccountState, DecodeError, MintState, Record, RecordKind, Subject};
use crate::ports::RecordDecoder;

/// Size of a token account.
pub const ACCOUNT_LEN: usize = 165;

/// Size of a mint.
pub const MINT_LEN: usize = 82;

const STATE_UNINITIALIZED: u8 = 0;
const STATE_INITIALIZED: u8 = 1;
const STATE_FROZEN: u8 = 2;

/// Layout size for a record kind.
pub fn layout_len(kind: RecordKind) -> usize {
    match kind {
        RecordKind::AccountState => ACCOUNT_LEN,
        RecordKind::MintState => MINT_LEN,
    }
}

/// Sequential little-endian reader over a length-checked buffer.
struct LayoutReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> LayoutReader<'a> {
    fn new(kind: RecordKind, data: &'a [u8]) -> Result<Self, DecodeError> {
        let expected = layout_len(kind);
        if data.len() != expected {
            return Err(DecodeError::InvalidLength {
                kind,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { data, offset: 0 })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn subject(&mut self) -> Subject {
        Subject::new_from_array(self.take())
    }

    fn option_tag(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.u32() {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::InvalidOptionTag { field, tag }),
        }
    }

    // The payload is always present in the layout, even when the tag is 0.
    fn option_subject(&mut self, field: &'static str) -> Result<Option<Subject>, DecodeError> {
        let present = self.option_tag(field)?;
        let value = self.subject();
        Ok(present.then_some(value))
    }

    fn option_u64(&mut self, field: &'static str) -> Result<Option<u64>, DecodeError> {
        let present = self.option_tag(field)?;
        let value = self.u64();
        Ok(present.then_some(value))
    }
}

/// Decode a token account stored at `address`.
pub fn decode_account(address: Subject, data: &[u8]) -> Result<AccountState, DecodeError> {
    let mut reader = LayoutReader::new(RecordKind::AccountState, data)?;

    let mint = reader.subject();
    let owner = reader.subject();
    let amount = reader.u64();
    let delegate = reader.option_subject("delegate")?;
    let state = reader.u8();
    let native_reserve = reader.option_u64("is_native")?;
    let raw_delegated_amount = reader.u64();
    let close_authority = reader.option_subject("close_authority")?;

    if state > STATE_FROZEN {
        return Err(DecodeError::InvalidAccountState(state));
    }

    Ok(AccountState {
        address,
        mint,
        owner,
        amount,
        delegated_amount: if delegate.is_some() {
            raw_delegated_amount
        } else {
            0
        },
        delegate,
        is_initialized: state != STATE_UNINITIALIZED,
        is_frozen: state == STATE_FROZEN,
        is_native: native_reserve.is_some(),
        rent_exempt_reserve: native_reserve,
        close_authority,
    })
}

/// Decode a mint.
pub fn decode_mint(data: &[u8]) -> Result<MintState, DecodeError> {
    let mut reader = LayoutReader::new(RecordKind::MintState, data)?;

    let mint_authority = reader.option_subject("mint_authority")?;
    let supply = reader.u64();
    let decimals = reader.u8();
    let is_initialized = reader.u8() != 0;
    let freeze_authority = reader.option_subject("freeze_authority")?;

    Ok(MintState {
        mint_authority,
        supply,
        decimals,
        is_initialized,
        freeze_authority,
    })
}

fn put_option_subject(out: &mut Vec<u8>, value: Option<Subject>) {
    out.extend_from_slice(&u32::from(value.is_some()).to_le_bytes());
    out.extend_from_slice(value.unwrap_or_default().as_ref());
}

/// Encode a token account into its on-chain layout.
///
/// Used to seed in-memory sources and fixtures.
pub fn encode_account(account: &AccountState) -> Vec<u8> {
    let mut out = Vec::with_capacity(ACCOUNT_LEN);
    out.extend_from_slice(account.mint.as_ref());
    out.extend_from_slice(account.owner.as_ref());
    out.extend_from_slice(&account.amount.to_le_bytes());
    put_option_subject(&mut out, account.delegate);
    out.push(match (account.is_initialized, account.is_frozen) {
        (_, true) => STATE_FROZEN,
        (true, false) => STATE_INITIALIZED,
        (false, false) => STATE_UNINITIALIZED,
    });
    out.extend_from_slice(&u32::from(account.rent_exempt_reserve.is_some()).to_le_bytes());
    out.extend_from_slice(&account.rent_exempt_reserve.unwrap_or(0).to_le_bytes());
    out.extend_from_slice(&account.delegated_amount.to_le_bytes());
    put_option_subject(&mut out, account.close_authority);
    out
}

/// Encode a mint into its on-chain layout.
pub fn encode_mint(mint: &MintState) -> Vec<u8> {
    let mut out = Vec::with_capacity(MINT_LEN);
    put_option_subject(&mut out, mint.mint_authority);
    out.extend_from_slice(&mint.supply.to_le_bytes());
    out.push(mint.decimals);
    out.push(u8::from(mint.is_initialized));
    put_option_subject(&mut out, mint.freeze_authority);
    out
}

/// Default decoder for legacy SPL token layouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplTokenCodec;

impl RecordDecoder for SplTokenCodec {
    fn decode(
        &self,
        kind: RecordKind,
        subject: &Subject,
        data: &[u8],
    ) -> Result<Record, DecodeError> {
        match kind {
            RecordKind::AccountState => decode_account(*subject, data).map(Record::Account),
            RecordKind::MintState => decode_mint(data).map(Record::Mint),
        }
    }
}
