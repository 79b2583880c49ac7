use crate::spec::step::StepId;
use crate::table::StepTable;
use crate::value::FormData;

pub type VisibilityMap = std::collections::BTreeMap<StepId, bool>;

/// Evaluates every slot's predicate against the latest data.
pub fn resolve_visibility(table: &StepTable, data: &FormData) -> VisibilityMap {
    table
        .ids()
        .map(|id| (id, table.is_visible(id, data)))
        .collect()
}

pub fn visible_steps(table: &StepTable, data: &FormData) -> Vec<StepId> {
    table.ids().filter(|id| table.is_visible(*id, data)).collect()
}
