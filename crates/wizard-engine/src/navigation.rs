//! Visibility scans. Visibility is re-evaluated on every call, so an answer
//! given on a later step can hide or reveal an earlier slot.

use wizard_spec::{FormData, StepId, StepTable};

/// Smallest visible id greater than `from`.
pub fn next_visible(table: &StepTable, from: StepId, data: &FormData) -> Option<StepId> {
    (from.saturating_add(1)..=table.len()).find(|id| table.is_visible(*id, data))
}

/// Largest visible id smaller than `from`.
pub fn previous_visible(table: &StepTable, from: StepId, data: &FormData) -> Option<StepId> {
    (1..from.min(table.len() + 1))
        .rev()
        .find(|id| table.is_visible(*id, data))
}

/// Where a successful advance lands: the next visible step, else N.
pub fn advance_target(table: &StepTable, from: StepId, data: &FormData) -> StepId {
    next_visible(table, from, data).unwrap_or(table.len())
}

/// Where a retreat lands: the previous visible step, else 1.
pub fn retreat_target(table: &StepTable, from: StepId, data: &FormData) -> StepId {
    previous_visible(table, from, data).unwrap_or(1)
}
