//! Variables are the typed inputs a cluster operator supplies when creating a cluster from a
//! ClusterClass. Every [`VariableSchema`] describes the shape of one such input using a subset of
//! OpenAPI v3.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

mod resolve;
mod value;

pub use resolve::*;
pub use value::*;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum SchemaError {
    #[snafu(display("required property {property:?} at {path} is not declared in the properties"))]
    UndeclaredRequiredProperty { path: String, property: String },

    #[snafu(display("schema at {path} declares properties but is of type {type_}"))]
    PropertiesOnNonObject { path: String, type_: SchemaType },

    #[snafu(display("array schema at {path} does not declare an items schema"))]
    MissingArrayItems { path: String },

    #[snafu(display("schema at {path} declares items but is of type {type_}"))]
    ItemsOnNonArray { path: String, type_: SchemaType },
}

/// The JSON type a [`SchemaProps`] node accepts.
#[derive(
    Clone, Copy, Debug, Deserialize, Hash, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SchemaType {
    Boolean,
    String,
    Integer,
    /// Accepts integers as well as floating point numbers.
    Number,
    Object,
    Array,
}

/// One node of an OpenAPI v3 schema.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProps {
    pub r#type: SchemaType,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaProps>,

    #[serde(
        rename = "required",
        default,
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub required_properties: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProps>>,
}

impl SchemaProps {
    pub fn new(r#type: SchemaType) -> Self {
        Self {
            r#type,
            properties: BTreeMap::new(),
            required_properties: BTreeSet::new(),
            items: None,
        }
    }

    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::new(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::new(SchemaType::Number)
    }

    pub fn object() -> Self {
        Self::new(SchemaType::Object)
    }

    pub fn array(items: Self) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(SchemaType::Array)
        }
    }

    /// Declares an optional property.
    pub fn with_property(mut self, name: impl Into<String>, schema: Self) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Declares a property which must be present in every conforming value.
    pub fn with_required_property(mut self, name: impl Into<String>, schema: Self) -> Self {
        let name = name.into();
        self.required_properties.insert(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Checks the structural invariants of this schema and all nested schemas.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.validate_at("$")
    }

    fn validate_at(&self, path: &str) -> Result<(), SchemaError> {
        match self.r#type {
            SchemaType::Object => {
                if let Some(property) = self
                    .required_properties
                    .iter()
                    .find(|property| !self.properties.contains_key(*property))
                {
                    return UndeclaredRequiredPropertySnafu {
                        path,
                        property: property.clone(),
                    }
                    .fail();
                }

                for (name, schema) in &self.properties {
                    schema.validate_at(&format!("{path}.{name}"))?;
                }
            }
            r#type => {
                ensure!(
                    self.properties.is_empty() && self.required_properties.is_empty(),
                    PropertiesOnNonObjectSnafu { path, type_: r#type }
                );
            }
        }

        match (self.r#type, &self.items) {
            (SchemaType::Array, Some(items)) => items.validate_at(&format!("{path}[*]")),
            (SchemaType::Array, None) => MissingArrayItemsSnafu { path }.fail(),
            (_, None) => Ok(()),
            (r#type, Some(_)) => ItemsOnNonArraySnafu { path, type_: r#type }.fail(),
        }
    }
}

/// Declares one named input a feature accepts.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSchema {
    pub name: String,
    pub required: bool,

    #[serde(with = "open_api_v3_schema")]
    pub schema: SchemaProps,
}

impl VariableSchema {
    pub fn required(name: impl Into<String>, schema: SchemaProps) -> Self {
        Self {
            name: name.into(),
            required: true,
            schema,
        }
    }

    pub fn optional(name: impl Into<String>, schema: SchemaProps) -> Self {
        Self {
            name: name.into(),
            required: false,
            schema,
        }
    }
}

/// Cluster API nests the schema of a variable below `schema.openAPIV3Schema`.
mod open_api_v3_schema {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::SchemaProps;

    #[derive(Serialize)]
    struct Borrowed<'a> {
        #[serde(rename = "openAPIV3Schema")]
        schema: &'a SchemaProps,
    }

    #[derive(Deserialize)]
    struct Owned {
        #[serde(rename = "openAPIV3Schema")]
        schema: SchemaProps,
    }

    pub fn serialize<S: Serializer>(schema: &SchemaProps, serializer: S) -> Result<S::Ok, S::Error> {
        Borrowed { schema }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SchemaProps, D::Error> {
        Owned::deserialize(deserializer).map(|owned| owned.schema)
    }
}
