//! # Domain Module
//!
//! Core types for live account observation: subjects, decoded records,
//! observation views, errors and the invariants tying them together.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
