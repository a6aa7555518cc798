//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: an in-process data source, a read
//! deadline wrapper and the associated token address deriver.

mod derivation;
mod in_memory;
mod timeout;

pub use derivation::AssociatedTokenDeriver;
pub use in_memory::{InMemoryAccountStore, ACCOUNT_NOT_FOUND};
pub use timeout::{TimeoutReader, READ_TIMEOUT};
