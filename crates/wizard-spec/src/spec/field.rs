use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// Shape of the answer a field collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Enum,
    Boolean,
    List,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Enum => "enum",
            FieldKind::Boolean => "boolean",
            FieldKind::List => "list",
        }
    }

    pub fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            FieldKind::Text | FieldKind::Enum => matches!(value, FieldValue::Text(_)),
            FieldKind::Boolean => matches!(value, FieldValue::Flag(_)),
            FieldKind::List => matches!(value, FieldValue::List(_)),
        }
    }
}

/// A single validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Check {
    Required,
    MinLength { limit: usize },
    MaxLength { limit: usize },
    Pattern { pattern: String },
    OneOf { values: Vec<String> },
    MinItems { limit: usize },
    MaxItems { limit: usize },
    /// The answer must be boolean `true` (terms, consent).
    Accepted,
}

/// Rule plus an optional message template overriding the default one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub check: Check,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Check> for RuleSpec {
    fn from(check: Check) -> Self {
        RuleSpec {
            check,
            message: None,
        }
    }
}

/// One input collected by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    /// Dotted path the answer is stored under.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
    /// Hint for hosts: Enter inserts a newline instead of advancing.
    #[serde(default)]
    pub multiline: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: false,
            choices: None,
            default_value: None,
            multiline: false,
            rules: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<RuleSpec>) -> Self {
        self.rules.push(rule.into());
        self
    }
}
