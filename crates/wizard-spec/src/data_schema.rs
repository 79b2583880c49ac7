use serde_json::{Map, Value, json};

use crate::spec::field::{Check, FieldKind, FieldSpec};
use crate::spec::wizard::WizardSchema;

/// JSON Schema describing the record a completed wizard hands off.
///
/// Fields of conditionally visible steps are listed but never required,
/// since a hidden step's answers may legitimately be absent.
pub fn generate(schema: &WizardSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for step in &schema.steps {
        for field in &step.fields {
            properties.insert(field.name.clone(), field_schema(field));
            if step.visible_if.is_none() && is_required(field) {
                required.push(Value::String(field.name.clone()));
            }
        }
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": schema.title,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": true,
    })
}

fn is_required(field: &FieldSpec) -> bool {
    field.required
        || field
            .rules
            .iter()
            .any(|rule| matches!(rule.check, Check::Required | Check::Accepted))
}

fn field_schema(field: &FieldSpec) -> Value {
    let mut map = Map::new();
    map.insert("title".into(), Value::String(field.label().to_string()));

    match field.kind {
        FieldKind::Text => {
            map.insert("type".into(), json!("string"));
        }
        FieldKind::Enum => {
            map.insert("type".into(), json!("string"));
            if let Some(choices) = &field.choices {
                map.insert("enum".into(), json!(choices));
            }
        }
        FieldKind::Boolean => {
            map.insert("type".into(), json!("boolean"));
        }
        FieldKind::List => {
            map.insert("type".into(), json!("array"));
            let items = match &field.choices {
                Some(choices) => json!({ "type": "string", "enum": choices }),
                None => json!({ "type": "string" }),
            };
            map.insert("items".into(), items);
        }
    }

    for rule in &field.rules {
        match &rule.check {
            Check::MinLength { limit } => {
                map.insert("minLength".into(), json!(limit));
            }
            Check::MaxLength { limit } => {
                map.insert("maxLength".into(), json!(limit));
            }
            Check::Pattern { pattern } => {
                map.insert("pattern".into(), json!(pattern));
            }
            Check::MinItems { limit } => {
                map.insert("minItems".into(), json!(limit));
            }
            Check::MaxItems { limit } => {
                map.insert("maxItems".into(), json!(limit));
            }
            Check::Accepted => {
                map.insert("const".into(), json!(true));
            }
            Check::OneOf { values } if field.kind == FieldKind::List => {
                map.insert("items".into(), json!({ "type": "string", "enum": values }));
            }
            Check::OneOf { values } => {
                map.insert("enum".into(), json!(values));
            }
            Check::Required => {}
        }
    }

    Value::Object(map)
}
