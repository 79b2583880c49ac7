use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::messages::{self, MessageContext};
use crate::spec::field::{Check, FieldSpec};
use crate::spec::step::StepId;
use crate::table::{SchemaError, StepTable};
use crate::value::{FieldValue, FormData};

/// Field path → message, one message per failing field.
pub type FieldErrors = BTreeMap<String, String>;

/// Outcome of validating one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: FieldErrors,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.insert(field.into(), message.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

/// A field with its rules ready to run; patterns are compiled once.
#[derive(Debug, Clone)]
pub(crate) struct CompiledField {
    spec: FieldSpec,
    patterns: Vec<Option<Regex>>,
}

impl CompiledField {
    pub(crate) fn compile(spec: &FieldSpec) -> Result<Self, SchemaError> {
        let patterns = spec
            .rules
            .iter()
            .map(|rule| match &rule.check {
                Check::Pattern { pattern } => {
                    Regex::new(pattern)
                        .map(Some)
                        .map_err(|source| SchemaError::InvalidPattern {
                            field: spec.name.clone(),
                            source,
                        })
                }
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            spec: spec.clone(),
            patterns,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.spec.name
    }

    /// First failing check, in the order: type, `required`, declared rules,
    /// declared choices.
    fn first_error(&self, data: &FormData) -> Option<String> {
        let spec = &self.spec;
        let value = data.get(&spec.name).filter(|value| !value.is_blank());

        if let Some(value) = value
            && !spec.kind.accepts(value)
        {
            return Some(messages::render(
                messages::TYPE_MISMATCH,
                &MessageContext::for_field(spec),
            ));
        }

        if spec.required && value.is_none() {
            return Some(messages::rule_message(spec, &Check::Required, None));
        }

        for (rule, pattern) in spec.rules.iter().zip(&self.patterns) {
            if fails(&rule.check, pattern.as_ref(), value) {
                return Some(messages::rule_message(
                    spec,
                    &rule.check,
                    rule.message.as_deref(),
                ));
            }
        }

        if let Some(choices) = &spec.choices
            && let Some(value) = value
            && !within_choices(choices, value)
        {
            let ctx = MessageContext {
                choices: Some(choices.join(", ")),
                ..MessageContext::for_field(spec)
            };
            return Some(messages::render(messages::INVALID_CHOICE, &ctx));
        }

        None
    }
}

fn within_choices(choices: &[String], value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(text) => choices.contains(text),
        FieldValue::List(items) => items.iter().all(|item| choices.contains(item)),
        _ => true,
    }
}

/// `value` is `None` for missing or blank answers. Only `required` and
/// `accepted` fail on an absent answer.
fn fails(check: &Check, pattern: Option<&Regex>, value: Option<&FieldValue>) -> bool {
    let Some(value) = value else {
        return matches!(check, Check::Required | Check::Accepted);
    };
    match check {
        Check::Required => false,
        Check::MinLength { limit } => value
            .as_str()
            .is_some_and(|text| text.chars().count() < *limit),
        Check::MaxLength { limit } => value
            .as_str()
            .is_some_and(|text| text.chars().count() > *limit),
        Check::Pattern { .. } => match (pattern, value.as_str()) {
            (Some(regex), Some(text)) => !regex.is_match(text),
            _ => false,
        },
        Check::OneOf { values } => !within_choices(values, value),
        Check::MinItems { limit } => value.as_list().is_some_and(|items| items.len() < *limit),
        Check::MaxItems { limit } => value.as_list().is_some_and(|items| items.len() > *limit),
        Check::Accepted => value.as_bool() != Some(true),
    }
}

pub(crate) fn validate_fields(fields: &[CompiledField], data: &FormData) -> ValidationResult {
    let errors = fields
        .iter()
        .filter_map(|field| {
            field
                .first_error(data)
                .map(|message| (field.name().to_string(), message))
        })
        .collect();
    ValidationResult { errors }
}

/// Validates a single step. Unknown step ids pass.
pub fn validate_step(table: &StepTable, id: StepId, data: &FormData) -> ValidationResult {
    table.validate(id, data)
}

/// Validates every step that is visible for `data`, returning the failing
/// ones in slot order.
pub fn validate_visible_steps(table: &StepTable, data: &FormData) -> Vec<(StepId, FieldErrors)> {
    table
        .ids()
        .filter(|id| table.is_visible(*id, data))
        .filter_map(|id| {
            let result = table.validate(id, data);
            (!result.is_valid()).then(|| (id, result.into_errors()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::field::{FieldKind, RuleSpec};

    fn compile(spec: FieldSpec) -> CompiledField {
        CompiledField::compile(&spec).expect("compile")
    }

    #[test]
    fn first_failing_rule_wins() {
        let field = compile(
            FieldSpec::new("handle", FieldKind::Text)
                .with_label("Handle")
                .with_rule(Check::MinLength { limit: 3 })
                .with_rule(Check::Pattern {
                    pattern: "^[a-z]+$".into(),
                }),
        );
        let data = FormData::new().with("handle", "A1");
        assert_eq!(
            field.first_error(&data).as_deref(),
            Some("Handle must be at least 3 characters")
        );

        let data = FormData::new().with("handle", "Abc");
        assert_eq!(
            field.first_error(&data).as_deref(),
            Some("Handle has an invalid format")
        );
    }

    #[test]
    fn optional_fields_skip_rules_when_blank() {
        let field = compile(
            FieldSpec::new("website", FieldKind::Text).with_rule(Check::Pattern {
                pattern: "^https://".into(),
            }),
        );
        assert!(field.first_error(&FormData::new()).is_none());
        assert!(field.first_error(&FormData::new().with("website", "")).is_none());
    }

    #[test]
    fn type_mismatch_precedes_rules() {
        let field = compile(FieldSpec::new("terms", FieldKind::Boolean).required());
        let data = FormData::new().with("terms", "yes");
        assert_eq!(
            field.first_error(&data).as_deref(),
            Some("terms has the wrong type")
        );
    }

    #[test]
    fn accepted_demands_true() {
        let field = compile(
            FieldSpec::new("terms", FieldKind::Boolean).with_rule(RuleSpec {
                check: Check::Accepted,
                message: Some("You must accept the community guidelines".into()),
            }),
        );
        let expected = Some("You must accept the community guidelines");
        assert_eq!(field.first_error(&FormData::new()).as_deref(), expected);
        assert_eq!(
            field
                .first_error(&FormData::new().with("terms", false))
                .as_deref(),
            expected
        );
        assert!(field.first_error(&FormData::new().with("terms", true)).is_none());
    }

    #[test]
    fn choices_apply_to_lists_item_by_item() {
        let field = compile(
            FieldSpec::new("interests", FieldKind::List)
                .with_label("Interests")
                .with_choices(["music", "games"])
                .with_rule(Check::MinItems { limit: 1 }),
        );
        assert_eq!(
            field
                .first_error(&FormData::new().with("interests", FieldValue::list(["music", "golf"])))
                .as_deref(),
            Some("Interests must be one of: music, games")
        );
        assert!(
            field
                .first_error(&FormData::new().with("interests", FieldValue::list(["games"])))
                .is_none()
        );
    }

    #[test]
    fn invalid_patterns_are_schema_errors() {
        let spec = FieldSpec::new("handle", FieldKind::Text).with_rule(Check::Pattern {
            pattern: "(".into(),
        });
        assert!(matches!(
            CompiledField::compile(&spec),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }
}
