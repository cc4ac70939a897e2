//! Ordered normalization stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;
use crate::record::Content;

use super::coerce::{deep_to_int, deep_to_string};

/// A single pure transformation applied to a raw payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Replaces the payload with one of its fields (e.g. `settings`).
    Extract {
        /// Field to extract.
        field: String,
    },
    /// Strips a single-key envelope such as `{"my-index": {...}}`.
    Unwrap,
    /// Removes server-managed top-level fields.
    DropFields {
        /// Fields to remove.
        fields: Vec<String>,
    },
    /// Every leaf becomes its string form.
    DeepToString,
    /// Integer-looking string leaves become integers.
    DeepToInt,
}

/// An ordered list of stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Stage {
    /// Applies this stage to a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not have the shape the stage needs.
    pub fn apply(&self, value: Value) -> Result<Value, ParseError> {
        match self {
            Self::Extract { field } => match value {
                Value::Object(mut map) => map
                    .remove(field)
                    .ok_or_else(|| ParseError::payload(format!("missing field '{field}'"))),
                other => Err(ParseError::payload(format!(
                    "expected an object holding '{field}', got {}",
                    type_name(&other)
                ))),
            },
            Self::Unwrap => match value {
                Value::Object(map) if map.len() == 1 => {
                    Ok(map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null))
                }
                other => Err(ParseError::payload(format!(
                    "expected a single-key envelope, got {}",
                    describe(&other)
                ))),
            },
            Self::DropFields { fields } => match value {
                Value::Object(mut map) => {
                    for field in fields {
                        map.remove(field);
                    }
                    Ok(Value::Object(map))
                }
                other => Ok(other),
            },
            Self::DeepToString => Ok(deep_to_string(value)),
            Self::DeepToInt => Ok(deep_to_int(value)),
        }
    }

    /// Returns true for stages that only change leaf representation.
    #[must_use]
    pub const fn is_coercion(&self) -> bool {
        matches!(self, Self::DeepToString | Self::DeepToInt)
    }
}

impl Pipeline {
    /// Creates a pipeline from explicit stages.
    #[must_use]
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// String pass then integer pass.
    #[must_use]
    pub fn coercing() -> Self {
        Self::new(vec![Stage::DeepToString, Stage::DeepToInt])
    }

    /// Extracts `field` and then coerces.
    #[must_use]
    pub fn extracting(field: impl Into<String>) -> Self {
        Self::new(vec![
            Stage::Extract { field: field.into() },
            Stage::DeepToString,
            Stage::DeepToInt,
        ])
    }

    /// Drops server-managed fields and then coerces.
    #[must_use]
    pub fn dropping(fields: &[&str]) -> Self {
        Self::new(vec![
            Stage::DropFields {
                fields: fields.iter().map(|f| (*f).to_string()).collect(),
            },
            Stage::DeepToString,
            Stage::DeepToInt,
        ])
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs every stage over a raw payload.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails or the result is not an object.
    pub fn run(&self, raw: Value) -> Result<Content, ParseError> {
        let value = self
            .stages
            .iter()
            .try_fold(raw, |value, stage| stage.apply(value))?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(ParseError::payload(format!(
                "normalized content must be an object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Applies only the coercion stages, for declared content.
    ///
    /// Declared content never carries the wire envelope, so structural
    /// stages are skipped.
    #[must_use]
    pub fn coerce_declared(&self, declared: &Content) -> Content {
        let value = self
            .stages
            .iter()
            .filter(|stage| stage.is_coercion())
            .fold(Value::Object(declared.clone()), |value, stage| match stage {
                Stage::DeepToString => deep_to_string(value),
                Stage::DeepToInt => deep_to_int(value),
                _ => value,
            });

        match value {
            Value::Object(map) => map,
            _ => declared.clone(),
        }
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("an object with {} keys", map.len()),
        other => type_name(other).to_string(),
    }
}
