use std::fmt;

use thiserror::Error;

use crate::spec::step::{StepId, StepSpec};
use crate::spec::wizard::WizardSchema;
use crate::validate::{CompiledField, ValidationResult, validate_fields};
use crate::value::FormData;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("wizard has no steps")]
    Empty,
    #[error("step id 0 is not a valid slot; ids start at 1")]
    ZeroStep,
    #[error("step {0} is declared more than once")]
    DuplicateStep(StepId),
    #[error("step {0} is missing; ids must run 1..=N without gaps")]
    MissingStep(StepId),
    #[error("field '{field}' has an invalid pattern")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to parse wizard schema")]
    Parse(#[source] serde_json::Error),
}

type Validator = Box<dyn Fn(&FormData) -> ValidationResult + Send + Sync>;
type Predicate = Box<dyn Fn(&FormData) -> bool + Send + Sync>;

/// One slot of the dispatch table: a validator and a visibility predicate.
///
/// Both closures must be pure functions of the data they are handed.
pub struct StepDefinition {
    id: StepId,
    title: String,
    fields: Vec<String>,
    validator: Option<Validator>,
    visible: Predicate,
}

impl StepDefinition {
    /// An always-visible step without rules.
    pub fn new(id: StepId) -> Self {
        Self {
            id,
            title: format!("Step {id}"),
            fields: Vec::new(),
            validator: None,
            visible: Box::new(|_| true),
        }
    }

    pub fn from_spec(spec: &StepSpec) -> Result<Self, SchemaError> {
        let compiled = spec
            .fields
            .iter()
            .map(CompiledField::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let mut step = StepDefinition::new(spec.id).titled(spec.title.clone());
        step.fields = spec.fields.iter().map(|field| field.name.clone()).collect();
        if !compiled.is_empty() {
            step = step.with_validator(move |data| validate_fields(&compiled, data));
        }
        if let Some(expr) = spec.visible_if.clone() {
            step = step.visible_when(move |data| expr.evaluate(data));
        }
        Ok(step)
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Field paths owned by this step, used to scope errors for display.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(&FormData) -> ValidationResult + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn visible_when(
        mut self,
        predicate: impl Fn(&FormData) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.visible = Box::new(predicate);
        self
    }

    /// Feature-flagged off.
    pub fn hidden(self) -> Self {
        self.visible_when(|_| false)
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn owns_field(&self, path: &str) -> bool {
        self.fields.iter().any(|field| {
            path == field
                || path
                    .strip_prefix(field.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn validate(&self, data: &FormData) -> ValidationResult {
        match &self.validator {
            Some(validator) => validator(data),
            None => ValidationResult::ok(),
        }
    }

    pub fn is_visible(&self, data: &FormData) -> bool {
        (self.visible)(data)
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("fields", &self.fields)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Ordered steps `1..=N`, looked up by slot number.
#[derive(Debug)]
pub struct StepTable {
    steps: Vec<StepDefinition>,
}

impl StepTable {
    pub fn new(mut steps: Vec<StepDefinition>) -> Result<Self, SchemaError> {
        if steps.is_empty() {
            return Err(SchemaError::Empty);
        }
        steps.sort_by_key(StepDefinition::id);
        for (index, step) in steps.iter().enumerate() {
            let expected = index + 1;
            match step.id {
                0 => return Err(SchemaError::ZeroStep),
                id if id < expected => return Err(SchemaError::DuplicateStep(id)),
                id if id > expected => return Err(SchemaError::MissingStep(expected)),
                _ => {}
            }
        }
        Ok(Self { steps })
    }

    pub fn from_schema(schema: &WizardSchema) -> Result<Self, SchemaError> {
        let steps = schema
            .steps
            .iter()
            .map(StepDefinition::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(steps)
    }

    /// N, the highest slot number.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, id: StepId) -> bool {
        (1..=self.len()).contains(&id)
    }

    pub fn get(&self, id: StepId) -> Option<&StepDefinition> {
        id.checked_sub(1).and_then(|index| self.steps.get(index))
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = StepId> + '_ {
        self.steps.iter().map(StepDefinition::id)
    }

    /// Unknown ids are never visible.
    pub fn is_visible(&self, id: StepId, data: &FormData) -> bool {
        self.get(id).is_some_and(|step| step.is_visible(data))
    }

    /// Unknown ids pass.
    pub fn validate(&self, id: StepId, data: &FormData) -> ValidationResult {
        self.get(id)
            .map(|step| step.validate(data))
            .unwrap_or_default()
    }
}
