//! Canonical match conditions and shorthand normalization.
//!
//! Callers write conditions in any of three shapes:
//!
//! - canonical groups: `{"and": [...]}` or `{"or": [...]}`
//! - field operators: `{"age": {"gte": 18}, "role": {"in": ["a", "b"]}}`
//! - scalar equality: `{"id": 42}`
//!
//! [`MatchCondition::normalize`] turns all of them into a [`MatchCondition`]
//! tree once, before any record is evaluated. Several fields in one object are
//! an implicit AND.

use std::{fmt, str::FromStr};

use serde_json::{Map, Value};

use crate::QueryError;

/// Comparison applied by a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field value is one of the operand's elements.
    In,
    /// Field value is none of the operand's elements.
    Nin,
    /// Every operand element is present in the (array) field.
    All,
    /// At least one operand element is present in the (array) field.
    Any,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::All => "all",
            Operator::Any => "any",
        }
    }

    /// Operators whose operand must be an array.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::Nin | Operator::All | Operator::Any)
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(operator: &str) -> Result<Self, Self::Err> {
        let parsed = match operator {
            "eq" => Operator::Eq,
            "neq" => Operator::Neq,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "in" => Operator::In,
            "nin" => Operator::Nin,
            "all" => Operator::All,
            "any" => Operator::Any,
            other => return Err(QueryError::unknown_operator(other)),
        };
        Ok(parsed)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `field op value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

/// Canonical boolean condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCondition {
    /// True when every child is true (an empty group is true).
    And(Vec<MatchCondition>),
    /// True when at least one child is true (an empty group is false).
    Or(Vec<MatchCondition>),
    Leaf(Leaf),
}

impl MatchCondition {
    /// Condition that matches every record.
    pub fn always() -> Self {
        MatchCondition::And(Vec::new())
    }

    /// Builds a leaf, validating that list operators receive an array operand.
    pub fn leaf(field: impl Into<String>, op: Operator, value: Value) -> Result<Self, QueryError> {
        let field = field.into();
        if op.takes_list() && !value.is_array() {
            return Err(QueryError::expected_array(field, op.as_str()));
        }
        Ok(MatchCondition::Leaf(Leaf { field, op, value }))
    }

    /// Normalizes any accepted condition shape into the canonical tree.
    ///
    /// `null` and `{}` match everything.
    pub fn normalize(condition: &Value) -> Result<Self, QueryError> {
        match condition {
            Value::Null => Ok(Self::always()),
            Value::Object(object) => normalize_object(object),
            other => Err(QueryError::invalid_condition(format!("expected an object, found {other}"))),
        }
    }
}

impl TryFrom<&Value> for MatchCondition {
    type Error = QueryError;

    fn try_from(condition: &Value) -> Result<Self, Self::Error> {
        MatchCondition::normalize(condition)
    }
}

fn normalize_object(object: &Map<String, Value>) -> Result<MatchCondition, QueryError> {
    let mut nodes = Vec::with_capacity(object.len());
    for (key, value) in object {
        match (key.as_str(), value) {
            ("and", Value::Array(children)) => nodes.push(MatchCondition::And(normalize_children(children)?)),
            ("or", Value::Array(children)) => nodes.push(MatchCondition::Or(normalize_children(children)?)),
            (field, Value::Object(operators)) => {
                if operators.is_empty() {
                    return Err(QueryError::invalid_condition(format!("field '{field}' has no operator")));
                }
                for (operator, operand) in operators {
                    let op = operator.parse::<Operator>()?;
                    nodes.push(MatchCondition::leaf(field, op, operand.clone())?);
                }
            }
            (field, scalar) => nodes.push(MatchCondition::leaf(field, Operator::Eq, scalar.clone())?),
        }
    }

    if nodes.len() == 1 {
        Ok(nodes.remove(0))
    } else {
        Ok(MatchCondition::And(nodes))
    }
}

fn normalize_children(children: &[Value]) -> Result<Vec<MatchCondition>, QueryError> {
    children
        .iter()
        .map(|child| match child {
            Value::Object(object) => normalize_object(object),
            other => Err(QueryError::invalid_condition(format!("group members must be objects, found {other}"))),
        })
        .collect()
}
