//! Patches mutate the templates a ClusterClass references. Every [`PatchDefinition`] is scoped to
//! exactly one resource type in one [`TargetRole`] of the cluster topology.
use std::str::FromStr;

use jsonptr::PointerBuf;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use strum::IntoEnumIterator;

use crate::gvk::ResourceType;

mod wire;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("unknown selector role {role:?}"))]
    UnknownSelectorRole { role: String },

    #[snafu(display("selector of patch {patch:?} matches no role"))]
    MissingSelectorRole { patch: String },

    #[snafu(display("selector of patch {patch:?} must match exactly one role"))]
    AmbiguousSelectorRole { patch: String },

    #[snafu(display("invalid JSON pointer {path:?}: {message}"))]
    InvalidPatchPath { path: String, message: String },

    #[snafu(display("unsupported JSON patch operation {op:?}"))]
    UnsupportedOperation { op: String },

    #[snafu(display("{op} operation on {path:?} requires exactly one of value or valueFrom"))]
    InvalidOperationValue { op: String, path: String },

    #[snafu(display("remove operation on {path:?} must not carry a value"))]
    UnexpectedOperationValue { path: String },

    #[snafu(display("patch {patch:?} must contain exactly one definition, found {count}"))]
    UnsupportedDefinitionCount { patch: String, count: usize },
}

/// The position a resource occupies within the cluster topology.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
)]
pub enum TargetRole {
    InfrastructureCluster,
    ControlPlaneInfrastructure,
    ControlPlane,
    MachineDeploymentInfrastructure,
    MachineDeploymentBootstrapConfig,
}

impl FromStr for TargetRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|role| role.as_ref() == s)
            .ok_or_else(|| Error::UnknownSelectorRole { role: s.to_owned() })
    }
}

/// Identifies the resources a [`PatchDefinition`] applies to.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceSelector {
    pub api_version: String,
    pub kind: String,
    pub role: TargetRole,
}

impl ResourceSelector {
    pub fn new(resource_type: ResourceType, role: TargetRole) -> Self {
        Self {
            api_version: resource_type.api_version.to_owned(),
            kind: resource_type.kind.to_owned(),
            role,
        }
    }

    /// Matching is exact on `(apiVersion, kind, role)`.
    pub fn matches(&self, target: &PatchTarget<'_>) -> bool {
        self.role == target.role && self.api_version == target.api_version && self.kind == target.kind
    }
}

/// A concrete resource being rendered for a role of the topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchTarget<'a> {
    pub api_version: &'a str,
    pub kind: &'a str,
    pub role: TargetRole,
}

/// The value an `add` or `replace` operation writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchValue {
    Literal(serde_json::Value),

    /// A reference to a topology variable, resolved when the patch is applied. Nested values are
    /// addressed with dots (`apiServerLoadBalancer.provider`).
    Variable(String),
}

impl PatchValue {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn variable(reference: impl Into<String>) -> Self {
        Self::Variable(reference.into())
    }
}

/// One RFC 6902 style operation. Operations of a [`PatchDefinition`] run in order, later
/// operations observe the effect of earlier ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOperation {
    /// Creates or overwrites the value at `path`.
    Add { path: String, value: PatchValue },

    /// Overwrites the value at `path`, which must exist.
    Replace { path: String, value: PatchValue },

    Remove { path: String },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: PatchValue) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: PatchValue) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Replace { .. } => "replace",
            Self::Remove { .. } => "remove",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
        }
    }

    pub fn value(&self) -> Option<&PatchValue> {
        match self {
            Self::Add { value, .. } | Self::Replace { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }

    /// Parses the path of this operation as JSON pointer.
    pub fn pointer(&self) -> Result<PointerBuf, Error> {
        parse_pointer(self.path())
    }
}

pub(crate) fn parse_pointer(path: &str) -> Result<PointerBuf, Error> {
    PointerBuf::parse(path).map_err(|err| Error::InvalidPatchPath {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

/// A named, selector-scoped list of operations. On the wire, every definition is one entry of
/// `ClusterClass.spec.patches`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(into = "wire::ClusterClassPatch", try_from = "wire::ClusterClassPatch")]
pub struct PatchDefinition {
    pub name: String,
    pub selector: ResourceSelector,
    pub operations: Vec<PatchOperation>,
}

impl PatchDefinition {
    pub fn new(name: impl Into<String>, selector: ResourceSelector) -> Self {
        Self {
            name: name.into(),
            selector,
            operations: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: PatchOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Ensures every operation path is a valid JSON pointer.
    pub fn validate(&self) -> Result<(), Error> {
        self.operations
            .iter()
            .try_for_each(|operation| operation.pointer().map(|_| ()))
    }

    /// All variable references of this definition, in operation order.
    pub fn variable_references(&self) -> impl Iterator<Item = &str> {
        self.operations
            .iter()
            .filter_map(|operation| match operation.value()? {
                PatchValue::Variable(reference) => Some(reference.as_str()),
                PatchValue::Literal(_) => None,
            })
    }

    pub fn matches(&self, target: &PatchTarget<'_>) -> bool {
        self.selector.matches(target)
    }
}

/// Returns the definitions matching `target`, preserving their order.
pub fn matching<'a>(
    patches: &'a [PatchDefinition],
    target: PatchTarget<'a>,
) -> impl Iterator<Item = &'a PatchDefinition> {
    patches.iter().filter(move |patch| patch.matches(&target))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::gvk::{OPENSTACK_CLUSTER_TEMPLATE, OPENSTACK_MACHINE_TEMPLATE};

    #[rstest]
    #[case("InfrastructureCluster", TargetRole::InfrastructureCluster)]
    #[case("ControlPlaneInfrastructure", TargetRole::ControlPlaneInfrastructure)]
    #[case("MachineDeploymentBootstrapConfig", TargetRole::MachineDeploymentBootstrapConfig)]
    fn parse_known_role(#[case] input: &str, #[case] expected: TargetRole) {
        assert_eq!(input.parse::<TargetRole>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[rstest]
    #[case("Infrastructure")]
    #[case("controlPlane")]
    #[case("")]
    fn parse_unknown_role(#[case] input: &str) {
        assert_eq!(input.parse::<TargetRole>().unwrap_err(), Error::UnknownSelectorRole {
            role: input.to_owned()
        });
    }

    #[test]
    fn selector_matching_is_exact() {
        let selector = ResourceSelector::new(
            OPENSTACK_MACHINE_TEMPLATE,
            TargetRole::ControlPlaneInfrastructure,
        );

        let target = |kind, role| PatchTarget {
            api_version: OPENSTACK_MACHINE_TEMPLATE.api_version,
            kind,
            role,
        };

        assert!(selector.matches(&target(
            "OpenStackMachineTemplate",
            TargetRole::ControlPlaneInfrastructure
        )));
        assert!(!selector.matches(&target(
            "OpenStackMachineTemplate",
            TargetRole::InfrastructureCluster
        )));
        assert!(!selector.matches(&target(
            "OpenStackMachineTemplate",
            TargetRole::MachineDeploymentInfrastructure
        )));
        assert!(!selector.matches(&target(
            OPENSTACK_CLUSTER_TEMPLATE.kind,
            TargetRole::ControlPlaneInfrastructure
        )));
        assert!(!selector.matches(&PatchTarget {
            api_version: "infrastructure.cluster.x-k8s.io/v1alpha7",
            kind: "OpenStackMachineTemplate",
            role: TargetRole::ControlPlaneInfrastructure,
        }));
    }

    #[test]
    fn matching_preserves_order() {
        let selector = ResourceSelector::new(
            OPENSTACK_CLUSTER_TEMPLATE,
            TargetRole::InfrastructureCluster,
        );
        let patches = vec![
            PatchDefinition::new("first", selector.clone()),
            PatchDefinition::new(
                "other",
                ResourceSelector::new(
                    OPENSTACK_MACHINE_TEMPLATE,
                    TargetRole::MachineDeploymentInfrastructure,
                ),
            ),
            PatchDefinition::new("second", selector),
        ];
        let target = PatchTarget {
            api_version: OPENSTACK_CLUSTER_TEMPLATE.api_version,
            kind: OPENSTACK_CLUSTER_TEMPLATE.kind,
            role: TargetRole::InfrastructureCluster,
        };

        let names: Vec<_> = matching(&patches, target)
            .map(|patch| patch.name.as_str())
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn invalid_path() {
        let patch = PatchDefinition::new(
            "broken",
            ResourceSelector::new(OPENSTACK_CLUSTER_TEMPLATE, TargetRole::InfrastructureCluster),
        )
        .with_operation(PatchOperation::add("/spec/template/spec/a", PatchValue::literal(1)))
        .with_operation(PatchOperation::add("spec/template", PatchValue::literal(json!({}))));

        let err = patch.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidPatchPath { ref path, .. } if path == "spec/template"));
    }

    #[test]
    fn variable_references() {
        let patch = PatchDefinition::new(
            "image",
            ResourceSelector::new(OPENSTACK_MACHINE_TEMPLATE, TargetRole::ControlPlaneInfrastructure),
        )
        .with_operation(PatchOperation::add("/spec/template/spec/image", PatchValue::literal(json!({}))))
        .with_operation(PatchOperation::add(
            "/spec/template/spec/image/id",
            PatchValue::variable("imageUUID"),
        ))
        .with_operation(PatchOperation::remove("/spec/template/spec/flavor"));

        assert_eq!(patch.variable_references().collect::<Vec<_>>(), ["imageUUID"]);
    }
}
