use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use super::{SchemaProps, SchemaType};

/// Returned when a [`VariableValue`] does not conform to a [`SchemaProps`].
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum SchemaMismatch {
    #[snafu(display("expected {expected} at {path}, found {found}"))]
    UnexpectedType {
        path: String,
        expected: SchemaType,
        found: &'static str,
    },

    #[snafu(display("required property {property:?} is missing at {path}"))]
    MissingProperty { path: String, property: String },

    #[snafu(display("property {property:?} at {path} is not declared by the schema"))]
    UnknownProperty { path: String, property: String },
}

/// A dynamically typed variable value.
///
/// Values are usually deserialized from JSON, integers which fit into an [`i64`] become
/// [`VariableValue::Integer`], every other number becomes a [`VariableValue::Float`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<VariableValue>),
    Object(BTreeMap<String, VariableValue>),
}

impl VariableValue {
    /// The JSON name of the kind of this value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Looks up a nested value by following object keys.
    pub fn get_path<'a>(&self, mut segments: impl Iterator<Item = &'a str>) -> Option<&Self> {
        segments.try_fold(self, |value, segment| match value {
            Self::Object(properties) => properties.get(segment),
            _ => None,
        })
    }
}

impl From<serde_json::Value> for VariableValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => number.as_f64().map_or(Self::Null, Self::Float),
            },
            Value::String(value) => Self::String(value),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(properties) => Self::Object(
                properties
                    .into_iter()
                    .map(|(name, value)| (name, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<VariableValue> for serde_json::Value {
    fn from(value: VariableValue) -> Self {
        match value {
            VariableValue::Null => Self::Null,
            VariableValue::Bool(value) => Self::Bool(value),
            VariableValue::Integer(value) => Self::from(value),
            // JSON has no representation for NaN and infinity
            VariableValue::Float(value) => {
                serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
            }
            VariableValue::String(value) => Self::String(value),
            VariableValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            VariableValue::Object(properties) => Self::Object(
                properties
                    .into_iter()
                    .map(|(name, value)| (name, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl SchemaProps {
    /// Checks that `value` conforms to this schema.
    ///
    /// Objects must carry every required property and no undeclared one, array items are checked
    /// against the `items` schema. `null` conforms to no schema.
    pub fn check(&self, value: &VariableValue) -> Result<(), SchemaMismatch> {
        self.check_at("$", value)
    }

    fn check_at(&self, path: &str, value: &VariableValue) -> Result<(), SchemaMismatch> {
        match (self.r#type, value) {
            (SchemaType::Boolean, VariableValue::Bool(_))
            | (SchemaType::String, VariableValue::String(_))
            | (SchemaType::Integer, VariableValue::Integer(_))
            | (SchemaType::Number, VariableValue::Integer(_) | VariableValue::Float(_)) => Ok(()),

            // Integral floats like `3.0` or integers beyond `i64::MAX` are still integers
            (SchemaType::Integer, VariableValue::Float(value))
                if value.is_finite() && value.fract() == 0.0 =>
            {
                Ok(())
            }

            (SchemaType::Object, VariableValue::Object(properties)) => {
                if let Some(property) = self
                    .required_properties
                    .iter()
                    .find(|property| !properties.contains_key(*property))
                {
                    return MissingPropertySnafu {
                        path,
                        property: property.clone(),
                    }
                    .fail();
                }

                for (name, value) in properties {
                    let Some(schema) = self.properties.get(name) else {
                        return UnknownPropertySnafu {
                            path,
                            property: name.clone(),
                        }
                        .fail();
                    };

                    schema.check_at(&format!("{path}.{name}"), value)?;
                }

                Ok(())
            }

            (SchemaType::Array, VariableValue::Array(items)) => match &self.items {
                Some(schema) => items
                    .iter()
                    .enumerate()
                    .try_for_each(|(index, item)| schema.check_at(&format!("{path}[{index}]"), item)),
                None => Ok(()),
            },

            (expected, value) => UnexpectedTypeSnafu {
                path,
                expected,
                found: value.kind(),
            }
            .fail(),
        }
    }
}
