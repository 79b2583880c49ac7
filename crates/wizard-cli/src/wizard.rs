use std::fmt::Write;

use wizard_engine::StepView;
use wizard_spec::{FieldErrors, FieldKind, FieldSpec, FieldValue, FormData, StepSpec, WizardSchema};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: step headers and prompts only.
    Clean,
    /// Verbose output: progress details, capabilities, parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints steps, prompts and results for the text shell.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, schema: &WizardSchema) {
        if self.header_printed {
            return;
        }
        println!("Wizard: {}", schema.title);
        if let Some(description) = &schema.description {
            println!("{}", description);
        }
        println!("Type :back to return to the previous step, :quit to save and exit.");
        self.header_printed = true;
    }

    pub fn show_step(&self, view: &StepView, step: &StepSpec) {
        println!();
        println!(
            "Step {}/{}: {}",
            view.progress.step_number, view.progress.total, view.title
        );
        if let Some(description) = &step.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose() {
            println!(
                "  slot {} (can advance: {}, can submit: {})",
                view.step_id, view.can_advance, view.can_submit
            );
        }
    }

    pub fn show_prompt(&self, field: &FieldSpec, current: Option<&FieldValue>) {
        let mut line = field.label().to_string();
        if field.required {
            line.push_str(" *");
        }
        if let Some(hint) = hint(field) {
            line.push(' ');
            line.push_str(&hint);
        }
        if let Some(current) = current.and_then(display_value) {
            line.push_str(&format!(" [{}]", current));
        }
        println!("{}", line);
        if self.verbosity.is_verbose() {
            println!("  ({}: {})", field.name, field.kind.as_str());
            if field.multiline {
                println!("  (multiline: use \\n for line breaks)");
            }
        }
    }

    pub fn show_errors(&self, errors: &FieldErrors) {
        for (field, message) in errors {
            if self.verbosity.is_verbose() {
                eprintln!("  ! {}: {}", field, message);
            } else {
                eprintln!("  ! {}", message);
            }
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_completion(&self, data: &FormData) {
        println!("Done ✅");
        match data.to_cbor() {
            Ok(bytes) => {
                println!("Record (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize record to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match data.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize record to JSON: {}", err);
                }
            }
        }
    }
}

fn hint(field: &FieldSpec) -> Option<String> {
    let choices = field.choices.as_deref().unwrap_or_default();
    match field.kind {
        FieldKind::Boolean => Some("(yes/no, y/n, true/false)".to_string()),
        FieldKind::Enum if !choices.is_empty() => Some(format!("({})", choices.join("/"))),
        FieldKind::List if !choices.is_empty() => {
            Some(format!("(comma separated: {})", choices.join(", ")))
        }
        FieldKind::List => Some("(comma separated)".to_string()),
        _ => None,
    }
}

fn display_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(text) if !text.is_empty() => Some(text.clone()),
        FieldValue::Flag(flag) => Some(if *flag { "yes" } else { "no" }.to_string()),
        FieldValue::List(items) if !items.is_empty() => Some(items.join(", ")),
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Turns a typed line into a value of the field's kind.
pub fn parse_answer(field: &FieldSpec, raw: &str) -> Result<FieldValue, AnswerParseError> {
    match field.kind {
        FieldKind::Text if field.multiline => Ok(FieldValue::Text(raw.replace("\\n", "\n"))),
        FieldKind::Text => Ok(FieldValue::text(raw)),
        FieldKind::Boolean => parse_boolean(raw),
        FieldKind::Enum => parse_enum(field, raw),
        FieldKind::List => Ok(parse_list(raw)),
    }
}

fn parse_boolean(raw: &str) -> Result<FieldValue, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(FieldValue::Flag(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(FieldValue::Flag(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

/// Accepts a choice by name (any case) or by its 1-based position.
fn parse_enum(field: &FieldSpec, raw: &str) -> Result<FieldValue, AnswerParseError> {
    let Some(choices) = field.choices.as_deref().filter(|choices| !choices.is_empty()) else {
        return Ok(FieldValue::text(raw));
    };

    let by_position = raw
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| choices.get(index));
    let by_name = choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw));

    match by_name.or(by_position) {
        Some(choice) => Ok(FieldValue::text(choice.as_str())),
        None => Err(AnswerParseError::new(
            format!("Choose one of: {}.", choices.join(", ")),
            Some(format!("allowed values: {}", choices.join(", "))),
        )),
    }
}

fn parse_list(raw: &str) -> FieldValue {
    FieldValue::list(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty()),
    )
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_accepts_common_spellings() {
        let field = FieldSpec::new("accept_terms", FieldKind::Boolean);
        assert_eq!(parse_answer(&field, "Y").unwrap(), FieldValue::Flag(true));
        assert_eq!(parse_answer(&field, "no").unwrap(), FieldValue::Flag(false));
        assert!(parse_answer(&field, "maybe").is_err());
    }

    #[test]
    fn enum_accepts_names_and_positions() {
        let field = FieldSpec::new("role", FieldKind::Enum).with_choices(["member", "organizer"]);
        assert_eq!(
            parse_answer(&field, "ORGANIZER").unwrap(),
            FieldValue::text("organizer")
        );
        assert_eq!(parse_answer(&field, "1").unwrap(), FieldValue::text("member"));
        let err = parse_answer(&field, "3").unwrap_err();
        assert_eq!(err.user_message, "Choose one of: member, organizer.");
    }

    #[test]
    fn list_splits_on_commas() {
        let field = FieldSpec::new("interests", FieldKind::List);
        assert_eq!(
            parse_answer(&field, " code, music ,,").unwrap(),
            FieldValue::list(["code", "music"])
        );
    }

    #[test]
    fn multiline_text_expands_escaped_newlines() {
        let mut field = FieldSpec::new("bio", FieldKind::Text);
        field.multiline = true;
        assert_eq!(
            parse_answer(&field, "line one\\nline two").unwrap(),
            FieldValue::text("line one\nline two")
        );
    }

    #[test]
    fn hex_encoding_is_lowercase() {
        assert_eq!(encode_hex(&[0x0a, 0xff]), "0aff");
    }
}
