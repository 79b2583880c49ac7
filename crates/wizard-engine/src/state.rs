use serde::Serialize;
use wizard_spec::{FieldErrors, FieldValue, FormData, Progress, StepId};

/// Everything the engine tracks for one wizard run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormState {
    pub current_step_id: StepId,
    pub data: FormData,
    /// Only populated right after a failed validation.
    pub errors: FieldErrors,
    pub submitting: bool,
    pub complete: bool,
}

impl FormState {
    pub(crate) fn new(current_step_id: StepId, data: FormData) -> Self {
        Self {
            current_step_id,
            data,
            errors: FieldErrors::new(),
            submitting: false,
            complete: false,
        }
    }
}

/// Synchronous intents a host may dispatch. Submission is async and goes
/// through [`crate::FormEngine::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    UpdateField { field: String, value: FieldValue },
    Advance,
    Retreat,
    Goto(StepId),
}

impl Intent {
    pub fn update(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Intent::UpdateField {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Intent::UpdateField { .. } => "update_field",
            Intent::Advance => "advance",
            Intent::Retreat => "retreat",
            Intent::Goto(_) => "goto",
        }
    }
}

/// Result of an intent that was accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A field was merged into the data.
    Updated,
    /// The current step changed (or was clamped in place).
    Moved { from: StepId, to: StepId },
    /// Validation failed; the errors are also stored on the state.
    Invalid(FieldErrors),
    /// The completion handler accepted the record.
    Completed,
}

impl Outcome {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Outcome::Invalid(_))
    }
}

/// What a step UI needs to render the current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub step_id: StepId,
    pub title: String,
    pub progress: Progress,
    pub values: FormData,
    /// Errors for fields owned by this step only.
    pub errors: FieldErrors,
    pub can_advance: bool,
    pub can_submit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_names_match_their_log_labels() {
        assert_eq!(Intent::update("role", "member").name(), "update_field");
        assert_eq!(Intent::Advance.name(), "advance");
        assert_eq!(Intent::Retreat.name(), "retreat");
        assert_eq!(Intent::Goto(3).name(), "goto");
    }
}
