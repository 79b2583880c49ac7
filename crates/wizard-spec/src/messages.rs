use std::sync::OnceLock;

use handlebars::Handlebars;
use serde::Serialize;

use crate::spec::field::{Check, FieldSpec};

/// Values a message template may reference.
#[derive(Debug, Clone, Serialize)]
pub struct MessageContext<'a> {
    pub field: &'a str,
    pub label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<String>,
}

impl<'a> MessageContext<'a> {
    pub fn for_field(field: &'a FieldSpec) -> Self {
        Self {
            field: &field.name,
            label: field.label(),
            limit: None,
            choices: None,
        }
    }

    fn for_check(field: &'a FieldSpec, check: &Check) -> Self {
        let mut ctx = Self::for_field(field);
        match check {
            Check::MinLength { limit }
            | Check::MaxLength { limit }
            | Check::MinItems { limit }
            | Check::MaxItems { limit } => ctx.limit = Some(*limit),
            Check::OneOf { values } => ctx.choices = Some(values.join(", ")),
            _ => {}
        }
        ctx
    }
}

pub const TYPE_MISMATCH: &str = "{{label}} has the wrong type";
pub const INVALID_CHOICE: &str = "{{label}} must be one of: {{choices}}";

pub fn default_template(check: &Check) -> &'static str {
    match check {
        Check::Required => "{{label}} is required",
        Check::MinLength { .. } => "{{label}} must be at least {{limit}} characters",
        Check::MaxLength { .. } => "{{label}} must be at most {{limit}} characters",
        Check::Pattern { .. } => "{{label}} has an invalid format",
        Check::OneOf { .. } => INVALID_CHOICE,
        Check::MinItems { .. } => "{{label}} needs at least {{limit}} entries",
        Check::MaxItems { .. } => "{{label}} allows at most {{limit}} entries",
        Check::Accepted => "{{label}} must be accepted",
    }
}

fn registry() -> &'static Handlebars<'static> {
    static REGISTRY: OnceLock<Handlebars<'static>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
    })
}

/// Renders `template`; a template that fails to render is returned as-is.
pub fn render(template: &str, ctx: &MessageContext<'_>) -> String {
    registry()
        .render_template(template, ctx)
        .unwrap_or_else(|_| template.to_string())
}

pub fn rule_message(field: &FieldSpec, check: &Check, custom: Option<&str>) -> String {
    let template = custom.unwrap_or_else(|| default_template(check));
    render(template, &MessageContext::for_check(field, check))
}
