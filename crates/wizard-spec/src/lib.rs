#![allow(missing_docs)]

pub mod data_schema;
pub mod expr;
pub mod messages;
pub mod progress;
pub mod spec;
pub mod table;
pub mod validate;
pub mod value;
pub mod visibility;

pub use data_schema::generate as data_schema;
pub use expr::Expr;
pub use progress::{Progress, progress, total_visible_steps, visible_step_number};
pub use spec::{Check, FieldKind, FieldSpec, RuleSpec, StepId, StepSpec, WizardSchema};
pub use table::{SchemaError, StepDefinition, StepTable};
pub use validate::{FieldErrors, ValidationResult, validate_step, validate_visible_steps};
pub use value::{FieldValue, FormData};
pub use visibility::{VisibilityMap, resolve_visibility, visible_steps};
