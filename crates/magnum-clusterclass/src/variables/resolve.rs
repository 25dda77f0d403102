use std::collections::{BTreeMap, btree_map::Entry};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use super::{SchemaMismatch, VariableSchema, VariableValue};

#[derive(Debug, Snafu)]
pub enum ResolveError {
    #[snafu(display("required variable {name:?} has no value"))]
    MissingRequiredVariable { name: String },

    #[snafu(display("value of variable {name:?} does not conform to its schema"))]
    SchemaMismatch { name: String, source: SchemaMismatch },

    #[snafu(display("variable {name:?} is not declared by the ClusterClass"))]
    UndeclaredVariable { name: String },

    #[snafu(display("variable {name:?} has more than one value"))]
    DuplicateValue { name: String },

    #[snafu(display("failed to serialize variable values"))]
    SerializeValues { source: serde_json::Error },

    #[snafu(display("variable values must serialize to an object, found {found}"))]
    ValuesNotAnObject { found: &'static str },
}

/// A topology variable as supplied by the operator of a cluster.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ClusterVariable {
    pub name: String,
    pub value: serde_json::Value,
}

impl ClusterVariable {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Turns every top-level field of `values` into one topology variable. Fields serialized as
    /// `null` (unset optional fields) are skipped.
    pub fn from_values<T: Serialize>(values: &T) -> Result<Vec<Self>, ResolveError> {
        match serde_json::to_value(values).context(SerializeValuesSnafu)? {
            serde_json::Value::Object(fields) => Ok(fields
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, value)| Self { name, value })
                .collect()),
            other => ValuesNotAnObjectSnafu {
                found: VariableValue::from(other).kind(),
            }
            .fail(),
        }
    }
}

/// Variable values which have been checked against their declaring [`VariableSchema`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedVariables(BTreeMap<String, VariableValue>);

impl ResolvedVariables {
    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.0.get(name)
    }

    /// Looks up a variable reference. The first dot-separated segment names the variable, the
    /// remaining segments address a nested property of its value
    /// (`apiServerLoadBalancer.provider`).
    pub fn lookup(&self, reference: &str) -> Option<&VariableValue> {
        let mut segments = reference.split('.');
        let value = self.get(segments.next()?)?;

        value.get_path(segments)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolves the `supplied` values against the `declared` variables.
///
/// Every supplied value must belong to a declared variable and conform to its schema, every
/// required variable must be supplied. Optional variables without a value are absent from the
/// result.
pub fn resolve(
    declared: &[VariableSchema],
    supplied: &[ClusterVariable],
) -> Result<ResolvedVariables, ResolveError> {
    let mut values = BTreeMap::new();

    for variable in supplied {
        match values.entry(variable.name.as_str()) {
            Entry::Occupied(_) => {
                return DuplicateValueSnafu {
                    name: variable.name.clone(),
                }
                .fail();
            }
            Entry::Vacant(entry) => {
                entry.insert(&variable.value);
            }
        }
    }

    let mut resolved = BTreeMap::new();

    for variable in declared {
        let Some(value) = values.remove(variable.name.as_str()) else {
            if variable.required {
                return MissingRequiredVariableSnafu {
                    name: variable.name.clone(),
                }
                .fail();
            }

            continue;
        };

        let value = VariableValue::from(value.clone());
        variable.schema.check(&value).context(SchemaMismatchSnafu {
            name: variable.name.clone(),
        })?;

        resolved.insert(variable.name.clone(), value);
    }

    if let Some(name) = values.into_keys().next() {
        return UndeclaredVariableSnafu { name }.fail();
    }

    debug!(count = resolved.len(), "resolved topology variables");
    Ok(ResolvedVariables(resolved))
}

pub fn find_variable<'a>(declared: &'a [VariableSchema], name: &str) -> Option<&'a VariableSchema> {
    declared.iter().find(|variable| variable.name == name)
}

/// Returns the declared variable a dotted `reference` points into.
pub fn referenced_variable<'a>(
    declared: &'a [VariableSchema],
    reference: &str,
) -> Result<&'a VariableSchema, ResolveError> {
    let name = reference.split('.').next().unwrap_or(reference);
    find_variable(declared, name).context(UndeclaredVariableSnafu { name })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::variables::{SchemaProps, SchemaType};

    fn declared() -> Vec<VariableSchema> {
        vec![
            VariableSchema::required(
                "apiServerLoadBalancer",
                SchemaProps::object()
                    .with_required_property("enabled", SchemaProps::boolean())
                    .with_required_property("provider", SchemaProps::string()),
            ),
            VariableSchema::optional("sshKeyName", SchemaProps::string()),
        ]
    }

    #[test]
    fn resolve_values() {
        let resolved = resolve(&declared(), &[ClusterVariable::new(
            "apiServerLoadBalancer",
            json!({"enabled": true, "provider": "amphora"}),
        )])
        .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved.lookup("apiServerLoadBalancer.provider"),
            Some(&VariableValue::String("amphora".into()))
        );
        assert_eq!(resolved.lookup("sshKeyName"), None);
    }

    #[test]
    fn missing_required_variable() {
        let err = resolve(&declared(), &[ClusterVariable::new("sshKeyName", "default")]).unwrap_err();

        assert!(
            matches!(err, ResolveError::MissingRequiredVariable { ref name } if name == "apiServerLoadBalancer")
        );
    }

    #[test]
    fn schema_mismatch() {
        let err = resolve(&declared(), &[ClusterVariable::new(
            "apiServerLoadBalancer",
            json!({"enabled": "true", "provider": "amphora"}),
        )])
        .unwrap_err();

        let ResolveError::SchemaMismatch { name, source } = err else {
            panic!("expected a schema mismatch");
        };
        assert_eq!(name, "apiServerLoadBalancer");
        assert_eq!(source, SchemaMismatch::UnexpectedType {
            path: "$.enabled".into(),
            expected: SchemaType::Boolean,
            found: "string",
        });
    }

    #[test]
    fn undeclared_and_duplicate_values() {
        let lb = ClusterVariable::new(
            "apiServerLoadBalancer",
            json!({"enabled": false, "provider": "ovn"}),
        );

        let err = resolve(&declared(), &[lb.clone(), ClusterVariable::new("flavor", "m1.large")])
            .unwrap_err();
        assert!(matches!(err, ResolveError::UndeclaredVariable { ref name } if name == "flavor"));

        let err = resolve(&declared(), &[lb.clone(), lb]).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateValue { .. }));
    }

    #[test]
    fn from_values() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Values {
            ssh_key_name: String,
            flavor: Option<String>,
        }

        let variables = ClusterVariable::from_values(&Values {
            ssh_key_name: "default".into(),
            flavor: None,
        })
        .unwrap();
        assert_eq!(variables, vec![ClusterVariable::new("sshKeyName", "default")]);

        let err = ClusterVariable::from_values(&["not", "an", "object"]).unwrap_err();
        assert!(matches!(err, ResolveError::ValuesNotAnObject { found: "array" }));
    }

    #[test]
    fn referenced_variable_by_root_segment() {
        let declared = declared();

        assert_eq!(
            referenced_variable(&declared, "apiServerLoadBalancer.enabled")
                .unwrap()
                .name,
            "apiServerLoadBalancer"
        );
        assert!(referenced_variable(&declared, "imageUUID").is_err());
    }
}
