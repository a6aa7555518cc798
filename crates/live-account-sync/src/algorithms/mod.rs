//! # Algorithms Module
//!
//! Pure, synchronous building blocks: binary layout decoding and
//! program-derived address derivation.

pub mod address;
pub mod codec;

pub use address::{
    find_associated_token_address, find_program_address, is_on_curve,
    ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use codec::{
    decode_account, decode_mint, encode_account, encode_mint, SplTokenCodec, ACCOUNT_LEN,
    MINT_LEN,
};
