use serde::Serialize;

use crate::spec::step::StepId;
use crate::table::StepTable;
use crate::value::FormData;

/// Progress counters for display, derived from the current data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Visible slots in `1..=current`.
    pub step_number: usize,
    /// Visible slots in `1..=N`.
    pub total: usize,
}

pub fn visible_step_number(table: &StepTable, current: StepId, data: &FormData) -> usize {
    table
        .ids()
        .take_while(|id| *id <= current)
        .filter(|id| table.is_visible(*id, data))
        .count()
}

pub fn total_visible_steps(table: &StepTable, data: &FormData) -> usize {
    table.ids().filter(|id| table.is_visible(*id, data)).count()
}

pub fn progress(table: &StepTable, current: StepId, data: &FormData) -> Progress {
    Progress {
        step_number: visible_step_number(table, current, data),
        total: total_visible_steps(table, data),
    }
}
