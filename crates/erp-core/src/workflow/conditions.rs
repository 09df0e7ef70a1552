//! Condition evaluation against an event payload.

use std::cmp::Ordering;

use serde_json::Value;

use crate::domain::{Condition, ConditionOperator};

/// Walks a dot path such as `customer.address.city` or `items.0.sku`.
pub fn resolve_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(payload, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers compare numerically even when one side is a numeric string.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(actual), as_number(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::Bool(a), Value::String(b)) | (Value::String(b), Value::Bool(a)) => {
            b.eq_ignore_ascii_case(if *a { "true" } else { "false" })
        }
        _ => false,
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a.partial_cmp(&b);
    }
    // ISO dates and timestamps order correctly as strings.
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

pub fn evaluate(condition: &Condition, payload: &Value) -> bool {
    let actual = resolve_path(payload, &condition.field);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::Eq => actual.is_some_and(|a| loose_eq(a, expected)),
        ConditionOperator::Ne => !actual.is_some_and(|a| loose_eq(a, expected)),
        ConditionOperator::Gt => actual.and_then(|a| compare(a, expected)) == Some(Ordering::Greater),
        ConditionOperator::Gte => matches!(
            actual.and_then(|a| compare(a, expected)),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ConditionOperator::Lt => actual.and_then(|a| compare(a, expected)) == Some(Ordering::Less),
        ConditionOperator::Lte => matches!(
            actual.and_then(|a| compare(a, expected)),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ConditionOperator::Contains => match (actual, expected) {
            (Some(Value::String(haystack)), Value::String(needle)) => {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            }
            (Some(Value::Array(items)), needle) => items.iter().any(|item| loose_eq(item, needle)),
            _ => false,
        },
        ConditionOperator::In => match (actual, expected) {
            (Some(a), Value::Array(options)) => options.iter().any(|option| loose_eq(a, option)),
            _ => false,
        },
    }
}

/// All conditions must hold; an empty list always matches.
pub fn evaluate_all(conditions: &[Condition], payload: &Value) -> bool {
    conditions.iter().all(|c| evaluate(c, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> Condition {
        Condition {
            field: field.into(),
            operator,
            value,
        }
    }

    fn payload() -> Value {
        json!({
            "name": "Acme Corp",
            "status": "new",
            "estimated_value": 150000,
            "email": "",
            "source": null,
            "tags": ["vip", "b2b"],
            "company": {"country": "ID"},
            "items": [{"sku": "A-1"}]
        })
    }

    #[test]
    fn test_resolve_path() {
        let p = payload();
        assert_eq!(resolve_path(&p, "company.country"), Some(&json!("ID")));
        assert_eq!(resolve_path(&p, "items.0.sku"), Some(&json!("A-1")));
        assert_eq!(resolve_path(&p, "items.3.sku"), None);
        assert_eq!(resolve_path(&p, "missing.path"), None);
    }

    #[test]
    fn test_equality_operators() {
        let p = payload();
        assert!(evaluate(&cond("status", ConditionOperator::Eq, json!("new")), &p));
        assert!(evaluate(&cond("estimated_value", ConditionOperator::Eq, json!("150000")), &p));
        assert!(evaluate(&cond("status", ConditionOperator::Ne, json!("converted")), &p));
        assert!(evaluate(&cond("missing", ConditionOperator::Ne, json!("x")), &p));
        assert!(!evaluate(&cond("missing", ConditionOperator::Eq, json!(null)), &p));
    }

    #[test]
    fn test_ordering_operators() {
        let p = payload();
        assert!(evaluate(&cond("estimated_value", ConditionOperator::Gt, json!(100000)), &p));
        assert!(evaluate(&cond("estimated_value", ConditionOperator::Gte, json!(150000)), &p));
        assert!(!evaluate(&cond("estimated_value", ConditionOperator::Lt, json!(150000)), &p));
        assert!(evaluate(&cond("estimated_value", ConditionOperator::Lte, json!(150000)), &p));
        assert!(!evaluate(&cond("name", ConditionOperator::Gt, json!(1)), &p));
    }

    #[test]
    fn test_membership_operators() {
        let p = payload();
        assert!(evaluate(&cond("name", ConditionOperator::Contains, json!("acme")), &p));
        assert!(evaluate(&cond("tags", ConditionOperator::Contains, json!("vip")), &p));
        assert!(evaluate(&cond("status", ConditionOperator::In, json!(["new", "contacted"])), &p));
        assert!(!evaluate(&cond("status", ConditionOperator::In, json!("new")), &p));
    }

    #[test]
    fn test_emptiness() {
        let p = payload();
        assert!(evaluate(&cond("email", ConditionOperator::IsEmpty, Value::Null), &p));
        assert!(evaluate(&cond("source", ConditionOperator::IsEmpty, Value::Null), &p));
        assert!(evaluate(&cond("nope", ConditionOperator::IsEmpty, Value::Null), &p));
        assert!(evaluate(&cond("tags", ConditionOperator::IsNotEmpty, Value::Null), &p));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let p = payload();
        assert!(evaluate_all(&[], &p));
        let conditions = vec![
            cond("status", ConditionOperator::Eq, json!("new")),
            cond("estimated_value", ConditionOperator::Gt, json!(200000)),
        ];
        assert!(!evaluate_all(&conditions, &p));
    }
}
