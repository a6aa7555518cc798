//! # Domain Invariants
//!
//! Rules that every published observation state must satisfy.

use super::entities::ObservationState;
use super::value_objects::SequenceMarker;

/// Invariant: a push update replaces the value only when its marker is
/// strictly newer than the last accepted one.
///
/// Equal markers are duplicates and smaller markers are out of order; both
/// are dropped.
pub fn invariant_newer_sequence(
    last: Option<SequenceMarker>,
    incoming: SequenceMarker,
) -> bool {
    match last {
        Some(last) => incoming > last,
        None => true,
    }
}

/// Invariant: the view is internally consistent.
///
/// - `loading` implies a subject, no value and no error
/// - `last_sequence` implies a value
/// - a value implies a subject
pub fn invariant_view_consistent(state: &ObservationState) -> Result<(), String> {
    if state.loading {
        if state.subject.is_none() {
            return Err("loading without a subject".to_string());
        }
        if state.value.is_some() {
            return Err("loading while holding a value".to_string());
        }
        if state.error.is_some() {
            return Err("loading while holding an error".to_string());
        }
    }

    if state.last_sequence.is_some() && state.value.is_none() {
        return Err("sequence marker without a value".to_string());
    }

    if state.value.is_some() && state.subject.is_none() {
        return Err("value without a subject".to_string());
    }

    Ok(())
}
