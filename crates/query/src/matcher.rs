//! Record evaluation over canonical conditions.

use std::cmp::Ordering;

use mblock_types::Record;
use serde_json::Value;

use crate::{
    QueryError,
    condition::{Leaf, MatchCondition, Operator},
};

/// Normalizes `condition` and evaluates it against `record`.
///
/// ```rust
/// use mblock_query::matches;
/// use serde_json::json;
///
/// let record = json!({"a": 1, "b": [1, 2, 3]});
/// let record = record.as_object().unwrap();
/// assert!(matches(record, &json!({"b": {"all": [1, 2]}})).unwrap());
/// assert!(!matches(record, &json!({"b": {"all": [1, 4]}})).unwrap());
/// ```
pub fn matches(record: &Record, condition: &Value) -> Result<bool, QueryError> {
    Ok(MatchCondition::normalize(condition)?.evaluate(record))
}

impl MatchCondition {
    /// Evaluates the tree against `record`. Pure and infallible.
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            MatchCondition::And(children) => children.iter().all(|child| child.evaluate(record)),
            MatchCondition::Or(children) => children.iter().any(|child| child.evaluate(record)),
            MatchCondition::Leaf(leaf) => leaf.evaluate(record),
        }
    }
}

impl Leaf {
    /// Applies the operator to `record[field]`. An absent field only satisfies `neq` and `nin`.
    pub fn evaluate(&self, record: &Record) -> bool {
        let actual = record.get(&self.field);
        match self.op {
            Operator::Eq => actual.is_some_and(|actual| loosely_equal(actual, &self.value)),
            Operator::Neq => !actual.is_some_and(|actual| loosely_equal(actual, &self.value)),
            Operator::Gt => ordering(actual, &self.value).is_some_and(Ordering::is_gt),
            Operator::Gte => ordering(actual, &self.value).is_some_and(Ordering::is_ge),
            Operator::Lt => ordering(actual, &self.value).is_some_and(Ordering::is_lt),
            Operator::Lte => ordering(actual, &self.value).is_some_and(Ordering::is_le),
            Operator::In => actual.is_some_and(|actual| list_contains(&self.value, actual)),
            Operator::Nin => !actual.is_some_and(|actual| list_contains(&self.value, actual)),
            Operator::All => match actual {
                Some(Value::Array(held)) => operand_items(&self.value).all(|wanted| contains(held, wanted)),
                _ => false,
            },
            Operator::Any => match actual {
                Some(Value::Array(held)) => operand_items(&self.value).any(|wanted| contains(held, wanted)),
                _ => false,
            },
        }
    }
}

/// Structural equality, except that numbers compare by value (`1 == 1.0`).
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => left == right,
        },
        _ => left == right,
    }
}

/// Native ordering for numbers, strings and booleans. Other pairs are unordered.
fn ordering(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn operand_items(operand: &Value) -> std::slice::Iter<'_, Value> {
    operand.as_array().map(Vec::as_slice).unwrap_or_default().iter()
}

fn list_contains(operand: &Value, needle: &Value) -> bool {
    operand.as_array().is_some_and(|items| contains(items, needle))
}

fn contains(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|item| loosely_equal(item, needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("record literal is an object")
    }

    fn check(record_value: Value, condition: Value) -> bool {
        matches(&record(record_value), &condition).expect("valid condition")
    }

    #[test]
    fn all_requires_every_operand_element() {
        assert!(check(json!({"a": 1, "b": [1, 2, 3]}), json!({"b": {"all": [1, 2]}})));
        assert!(!check(json!({"a": 1, "b": [1, 2, 3]}), json!({"b": {"all": [1, 4]}})));
        assert!(!check(json!({"a": 1}), json!({"b": {"all": [1]}})), "absent field never matches all");
    }

    #[test]
    fn canonical_and_with_any() {
        assert!(check(
            json!({"a": 1, "b": [1, 2, 3]}),
            json!({"and": [{"a": {"eq": 1}}, {"b": {"any": [4, 3]}}]})
        ));
        assert!(!check(
            json!({"a": 1, "b": [1, 2, 3]}),
            json!({"and": [{"a": {"eq": 2}}, {"b": {"any": [4, 3]}}]})
        ));
    }

    #[test]
    fn or_needs_one_true_child() {
        let condition = json!({"or": [{"a": {"eq": 2}}, {"b": {"lt": 10}}]});
        assert!(check(json!({"a": 1, "b": 5}), condition.clone()));
        assert!(!check(json!({"a": 1, "b": 50}), condition));
        assert!(!check(json!({"a": 1}), json!({"or": []})));
    }

    #[test]
    fn scalar_shorthand_round_trips() {
        assert!(check(json!({"x": 5}), json!({"x": 5})));
        assert!(!check(json!({"x": 5}), json!({"x": 6})));
    }

    #[test]
    fn comparison_operators_use_native_ordering() {
        let row = json!({"n": 10, "s": "m", "f": 2.5});
        assert!(check(row.clone(), json!({"n": {"gt": 9}})));
        assert!(check(row.clone(), json!({"n": {"gte": 10}})));
        assert!(!check(row.clone(), json!({"n": {"lt": 10}})));
        assert!(check(row.clone(), json!({"n": {"lte": 10.0}})));
        assert!(check(row.clone(), json!({"s": {"gt": "a"}})));
        assert!(check(row.clone(), json!({"f": {"lt": 3}})));
        assert!(!check(row, json!({"n": {"gt": "9"}})), "mixed types are unordered");
    }

    #[test]
    fn membership_operators() {
        let row = json!({"role": "editor"});
        assert!(check(row.clone(), json!({"role": {"in": ["admin", "editor"]}})));
        assert!(!check(row.clone(), json!({"role": {"nin": ["admin", "editor"]}})));
        assert!(check(row.clone(), json!({"missing": {"nin": ["x"]}})));
        assert!(!check(row, json!({"missing": {"in": ["x"]}})));
    }

    #[test]
    fn absent_fields_only_satisfy_negations() {
        let row = json!({"a": null});
        assert!(check(row.clone(), json!({"a": null})), "explicit null equals null");
        assert!(!check(row.clone(), json!({"b": null})), "absent is not null");
        assert!(check(row, json!({"b": {"neq": 1}})));
    }

    #[test]
    fn scalar_fields_never_match_all_or_any() {
        assert!(!check(json!({"tags": "abc"}), json!({"tags": {"any": ["a"]}})));
        assert!(!check(json!({"tags": 3}), json!({"tags": {"all": [3]}})));
    }

    #[test]
    fn unknown_operator_fails() {
        let error = matches(&record(json!({"a": 1})), &json!({"a": {"regex": "^1"}})).expect_err("unknown operator");
        assert_eq!(error, QueryError::unknown_operator("regex"));
    }
}
