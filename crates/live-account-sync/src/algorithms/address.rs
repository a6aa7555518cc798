//! # Program-Derived Addresses
//!
//! Deterministic derivation of associated token account addresses.
//!
//! Associated token account seeds are `[owner, token_program_id, mint]`
//! under the associated token program. The canonical (highest) bump that
//! lands off the ed25519 curve wins.

use solana_pubkey::{pubkey, Pubkey};

use crate::domain::{Subject, SyncError};

/// Legacy SPL token program.
pub const TOKEN_PROGRAM_ID: Subject =
    Subject::from_pubkey(pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"));

/// Associated token account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Subject =
    Subject::from_pubkey(pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"));

/// True if the address is a valid ed25519 point.
///
/// Only on-curve addresses have a private key and can sign.
pub fn is_on_curve(address: &Subject) -> bool {
    address.pubkey().is_on_curve()
}

/// Find the canonical program address for `seeds` and its bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Subject,
) -> Result<(Subject, u8), SyncError> {
    Pubkey::try_find_program_address(seeds, program_id.pubkey())
        .map(|(address, bump)| (Subject::from(address), bump))
        .ok_or_else(|| SyncError::derivation("Unable to find a viable program address bump seed"))
}

/// Derive the associated token account of `owner` for `mint`.
///
/// Fails when `owner` is off curve (cannot sign) unless
/// `allow_owner_off_curve` is set, e.g. for PDA-owned accounts.
pub fn find_associated_token_address(
    mint: &Subject,
    owner: &Subject,
    allow_owner_off_curve: bool,
    token_program_id: &Subject,
    associated_token_program_id: &Subject,
) -> Result<Subject, SyncError> {
    if !allow_owner_off_curve && !is_on_curve(owner) {
        return Err(SyncError::derivation(format!("Owner cannot sign: {owner}")));
    }

    let (address, _) = find_program_address(
        &[owner.as_ref(), token_program_id.as_ref(), mint.as_ref()],
        associated_token_program_id,
    )?;
    Ok(address)
}
