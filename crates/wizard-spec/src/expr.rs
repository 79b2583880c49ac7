use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value::FormData;

/// Lightweight expression AST used for `visible_if`.
///
/// Evaluation is total: a field that is missing or has the wrong shape makes
/// the leaf it appears in false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
    IsSet { field: String },
    Flag { field: String },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
}

impl Expr {
    pub fn evaluate(&self, data: &FormData) -> bool {
        match self {
            Expr::LiteralBool { value } => *value,
            Expr::Eq { field, value } => text_of(data, field) == Some(value.as_str()),
            Expr::In { field, values } => text_of(data, field)
                .is_some_and(|text| values.iter().any(|candidate| candidate == text)),
            Expr::IsSet { field } => data.is_set(field),
            Expr::Flag { field } => data
                .get(field)
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
            Expr::And { expressions } => expressions.iter().all(|expr| expr.evaluate(data)),
            Expr::Or { expressions } => expressions.iter().any(|expr| expr.evaluate(data)),
            Expr::Not { expression } => !expression.evaluate(data),
        }
    }
}

fn text_of<'a>(data: &'a FormData, field: &str) -> Option<&'a str> {
    data.get(field).and_then(|value| value.as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn in_matches_one_of_the_values() {
        let expr: Expr = serde_json::from_value(json!({
            "op": "in",
            "field": "role",
            "values": ["organizer", "creator"]
        }))
        .expect("expr");

        assert!(expr.evaluate(&FormData::new().with("role", "creator")));
        assert!(!expr.evaluate(&FormData::new().with("role", "member")));
        assert!(!expr.evaluate(&FormData::new()));
    }

    #[test]
    fn wrong_shapes_are_condition_not_met() {
        let data = FormData::new().with("role", true).with("beta", "yes");
        let eq = Expr::Eq {
            field: "role".into(),
            value: "true".into(),
        };
        let flag = Expr::Flag {
            field: "beta".into(),
        };
        assert!(!eq.evaluate(&data));
        assert!(!flag.evaluate(&data));
    }

    #[test]
    fn combinators_compose() {
        let expr = Expr::And {
            expressions: vec![
                Expr::Flag {
                    field: "beta".into(),
                },
                Expr::Not {
                    expression: Box::new(Expr::IsSet {
                        field: "invite_code".into(),
                    }),
                },
            ],
        };
        assert!(expr.evaluate(&FormData::new().with("beta", true)));
        assert!(!expr.evaluate(&FormData::new().with("beta", true).with("invite_code", "x")));
    }
}
