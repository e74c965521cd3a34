//! Condition — a guard that must be true for a rule or step to proceed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::EventType;

/// Comparison operator applied to an event payload field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

impl CompareOp {
    /// Apply this operator to an actual and expected value.
    ///
    /// Non-comparable combinations (e.g. ordering a string against a
    /// number) evaluate to `false` rather than erroring.
    #[must_use]
    pub fn compare(self, actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
        match self {
            Self::Eq => values_equal(actual, expected),
            Self::Ne => !values_equal(actual, expected),
            Self::Gt => ordered(actual, expected).is_some_and(|(a, e)| a > e),
            Self::Gte => ordered(actual, expected).is_some_and(|(a, e)| a >= e),
            Self::Lt => ordered(actual, expected).is_some_and(|(a, e)| a < e),
            Self::Lte => ordered(actual, expected).is_some_and(|(a, e)| a <= e),
            Self::In => expected
                .as_array()
                .is_some_and(|arr| arr.iter().any(|e| values_equal(actual, e))),
            Self::NotIn => expected
                .as_array()
                .is_some_and(|arr| !arr.iter().any(|e| values_equal(actual, e))),
        }
    }
}

/// Equality with numeric normalization, so `150` matches `150.0`.
fn values_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => a == b,
    }
}

fn ordered(a: &serde_json::Value, b: &serde_json::Value) -> Option<(f64, f64)> {
    Some((a.as_f64()?, b.as_f64()?))
}

/// A predicate over the current event, the user's profile, or the user's
/// event history.
///
/// Conditions are authored and stored as tagged structures — they are
/// parsed once when the rule is loaded, never re-interpreted from string
/// keys at evaluation time. All conditions in a set must hold (logical
/// AND), and anything unresolvable evaluates to `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Compares a field of the current event payload.
    Event {
        /// Dotted path into the payload, e.g. `"amount"` or `"cart.total"`.
        field: String,
        #[serde(default)]
        op: CompareOp,
        value: serde_json::Value,
    },
    /// Requires a profile attribute to equal a value.
    User {
        field: String,
        value: serde_json::Value,
    },
    /// Requires at least N events of a kind within a trailing window.
    EventCount {
        event_type: EventType,
        within_days: u32,
        at_least: usize,
    },
    /// Requires an event of a kind to have occurred recently.
    LastEvent {
        event_type: EventType,
        within_hours: u32,
    },
}

impl Condition {
    /// Check definition invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyConditionField`] when a field path
    /// is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Event { field, .. } | Self::User { field, .. } => {
                if field.is_empty() {
                    return Err(ValidationError::EmptyConditionField);
                }
            }
            Self::EventCount { .. } | Self::LastEvent { .. } => {}
        }
        Ok(())
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event { field, op, value } => write!(f, "event({field} {op:?} {value})"),
            Self::User { field, value } => write!(f, "user({field} == {value})"),
            Self::EventCount {
                event_type,
                within_days,
                at_least,
            } => write!(f, "event_count({event_type} >= {at_least} in {within_days}d)"),
            Self::LastEvent {
                event_type,
                within_hours,
            } => write!(f, "last_event({event_type} in {within_hours}h)"),
        }
    }
}

/// Resolve a dotted path into a JSON payload.
#[must_use]
pub fn lookup_path<'v>(data: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_compare_numbers_across_integer_and_float() {
        assert!(CompareOp::Eq.compare(&json!(150), &json!(150.0)));
        assert!(CompareOp::Gte.compare(&json!(150), &json!(100)));
        assert!(!CompareOp::Gte.compare(&json!(50), &json!(100)));
        assert!(CompareOp::Lt.compare(&json!(50), &json!(100)));
    }

    #[test]
    fn should_compare_strings_for_equality_only() {
        assert!(CompareOp::Eq.compare(&json!("gold"), &json!("gold")));
        assert!(CompareOp::Ne.compare(&json!("gold"), &json!("silver")));
        // Ordering a string is not comparable — fails closed.
        assert!(!CompareOp::Gt.compare(&json!("gold"), &json!("silver")));
    }

    #[test]
    fn should_check_membership_with_in_and_not_in() {
        let set = json!(["gold", "platinum"]);
        assert!(CompareOp::In.compare(&json!("gold"), &set));
        assert!(!CompareOp::In.compare(&json!("silver"), &set));
        assert!(CompareOp::NotIn.compare(&json!("silver"), &set));
        // `in` against a non-array fails closed.
        assert!(!CompareOp::In.compare(&json!("gold"), &json!("gold")));
    }

    #[test]
    fn should_lookup_nested_fields_through_dotted_paths() {
        let data = json!({"cart": {"total": 99.5, "items": 3}});
        assert_eq!(lookup_path(&data, "cart.total"), Some(&json!(99.5)));
        assert_eq!(lookup_path(&data, "cart.items"), Some(&json!(3)));
        assert_eq!(lookup_path(&data, "cart.missing"), None);
        assert_eq!(lookup_path(&data, "missing"), None);
    }

    #[test]
    fn should_reject_empty_condition_field() {
        let condition = Condition::Event {
            field: String::new(),
            op: CompareOp::Eq,
            value: json!(1),
        };
        assert_eq!(
            condition.validate(),
            Err(ValidationError::EmptyConditionField)
        );
    }

    #[test]
    fn should_accept_history_conditions_without_fields() {
        let condition = Condition::EventCount {
            event_type: EventType::PurchaseComplete,
            within_days: 30,
            at_least: 3,
        };
        assert!(condition.validate().is_ok());
    }

    #[test]
    fn should_deserialize_event_condition_from_tagged_json() {
        let json = json!({
            "type": "event",
            "field": "amount",
            "op": ">=",
            "value": 100
        });
        let c: Condition = serde_json::from_value(json).unwrap();
        assert!(matches!(
            c,
            Condition::Event { ref field, op: CompareOp::Gte, .. } if field == "amount"
        ));
    }

    #[test]
    fn should_default_to_equality_when_op_is_omitted() {
        let json = json!({
            "type": "event",
            "field": "plan",
            "value": "pro"
        });
        let c: Condition = serde_json::from_value(json).unwrap();
        assert!(matches!(c, Condition::Event { op: CompareOp::Eq, .. }));
    }

    #[test]
    fn should_roundtrip_conditions_through_serde_json() {
        let conditions = vec![
            Condition::Event {
                field: "amount".to_string(),
                op: CompareOp::Gte,
                value: json!(100),
            },
            Condition::User {
                field: "plan".to_string(),
                value: json!("pro"),
            },
            Condition::EventCount {
                event_type: EventType::PurchaseComplete,
                within_days: 30,
                at_least: 3,
            },
            Condition::LastEvent {
                event_type: EventType::EmailOpened,
                within_hours: 48,
            },
        ];

        for condition in &conditions {
            let json = serde_json::to_string(condition).unwrap();
            let parsed: Condition = serde_json::from_str(&json).unwrap();
            assert_eq!(&parsed, condition);
        }
    }
}
