//! Associated Token Deriver Adapter
//!
//! Implements `AddressDeriver` with the associated token account derivation.

use async_trait::async_trait;
use tracing::debug;

use crate::algorithms::{
    find_associated_token_address, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::config::SyncConfig;
use crate::domain::{Subject, SyncError};
use crate::ports::outbound::AddressDeriver;

/// Derives the associated token account of an owner for a mint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssociatedTokenDeriver {
    token_program_id: Subject,
    associated_token_program_id: Subject,
}

impl AssociatedTokenDeriver {
    /// Create a deriver for explicit program ids.
    pub fn new(token_program_id: Subject, associated_token_program_id: Subject) -> Self {
        Self {
            token_program_id,
            associated_token_program_id,
        }
    }

    /// Create a deriver for the configured program ids.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.token_program_id, config.associated_token_program_id)
    }
}

impl Default for AssociatedTokenDeriver {
    fn default() -> Self {
        Self::new(TOKEN_PROGRAM_ID, ASSOCIATED_TOKEN_PROGRAM_ID)
    }
}

#[async_trait]
impl AddressDeriver for AssociatedTokenDeriver {
    async fn derive(
        &self,
        base: Subject,
        owner: Subject,
        allow_off_curve: bool,
    ) -> Result<Subject, SyncError> {
        let address = find_associated_token_address(
            &base,
            &owner,
            allow_off_curve,
            &self.token_program_id,
            &self.associated_token_program_id,
        )?;
        debug!(mint = %base, %owner, %address, "derived associated token account");
        Ok(address)
    }
}
