pub mod field;
pub mod step;
pub mod wizard;

pub use field::{Check, FieldKind, FieldSpec, RuleSpec};
pub use step::{StepId, StepSpec};
pub use wizard::WizardSchema;
