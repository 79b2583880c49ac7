use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::step::StepSpec;
use crate::table::SchemaError;
use crate::value::FormData;

/// Top-level wizard definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WizardSchema {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepSpec>,
}

impl WizardSchema {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(SchemaError::Parse)
    }

    /// Hard-coded starting answers declared through `default_value`.
    pub fn defaults(&self) -> FormData {
        self.steps
            .iter()
            .flat_map(|step| step.fields.iter())
            .filter_map(|field| {
                field
                    .default_value
                    .clone()
                    .map(|value| (field.name.clone(), value))
            })
            .collect()
    }
}
