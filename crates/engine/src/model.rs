//! Model collaborator used by the validation and formatting steps.
//!
//! The engine only needs three things from a model: which payload keys it does
//! not know, whether a payload is valid, and how to format one. Applications
//! plug in their own schema library by implementing [`Model`]; [`FieldModel`]
//! is a small declarative implementation for simple blocks and tests.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub trait Model: fmt::Debug + Send + Sync {
    /// Top-level keys of `data` the model does not declare.
    fn unknown_keys(&self, data: &Value) -> Vec<String>;

    /// Validates `data`. On failure returns the errors as a JSON value keyed by field.
    fn validate(&self, data: &Value) -> Result<(), Value>;

    /// Returns a formatted copy of `data`.
    fn format(&self, data: &Value) -> Value;
}

/// Expected JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// Declaration of a single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldSpec {
    pub required: bool,
    /// Value filled in by [`Model::format`] when the field is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
}

impl FieldSpec {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn optional() -> Self {
        Self::default()
    }

    pub fn of_kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Declarative model: an ordered map of field name to [`FieldSpec`].
///
/// Deserializes from a plain mapping, e.g.
/// `{"name": {"required": true, "type": "string"}, "tags": {"default": []}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldModel {
    fields: IndexMap<String, FieldSpec>,
}

impl FieldModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    fn validate_record(&self, record: &Map<String, Value>) -> Map<String, Value> {
        let mut errors = Map::new();
        for (name, spec) in &self.fields {
            match record.get(name) {
                None | Some(Value::Null) if spec.required => {
                    errors.insert(name.clone(), Value::from("is required"));
                }
                Some(value) if !value.is_null() => {
                    if let Some(kind) = spec.kind.filter(|kind| !kind.accepts(value)) {
                        errors.insert(name.clone(), Value::from(format!("expected {}", kind.as_str())));
                    }
                }
                _ => {}
            }
        }
        for key in record.keys().filter(|key| !self.fields.contains_key(*key)) {
            errors.insert(key.clone(), Value::from("unknown field"));
        }
        errors
    }
}

impl Model for FieldModel {
    fn unknown_keys(&self, data: &Value) -> Vec<String> {
        match data {
            Value::Object(record) => record.keys().filter(|key| !self.fields.contains_key(*key)).cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn validate(&self, data: &Value) -> Result<(), Value> {
        let errors = match data {
            Value::Object(record) => self.validate_record(record),
            _ => Map::from_iter([("_".to_string(), Value::from("expected an object"))]),
        };
        if errors.is_empty() { Ok(()) } else { Err(Value::Object(errors)) }
    }

    /// Fills defaults for absent fields. Arrays are formatted element-wise;
    /// anything else is returned unchanged.
    fn format(&self, data: &Value) -> Value {
        match data {
            Value::Object(record) => {
                let mut formatted = record.clone();
                for (name, spec) in &self.fields {
                    if let Some(default) = &spec.default {
                        formatted.entry(name.clone()).or_insert_with(|| default.clone());
                    }
                }
                Value::Object(formatted)
            }
            Value::Array(records) => Value::Array(records.iter().map(|record| self.format(record)).collect()),
            other => other.clone(),
        }
    }
}
