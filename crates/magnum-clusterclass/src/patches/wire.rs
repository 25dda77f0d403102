//! The Cluster API representation of patches (`ClusterClass.spec.patches[]`).
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::{
    AmbiguousSelectorRoleSnafu, Error, InvalidOperationValueSnafu, MissingSelectorRoleSnafu,
    PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole,
    UnexpectedOperationValueSnafu, UnsupportedOperationSnafu, parse_pointer,
};
use crate::{
    crd::DEFAULT_WORKER_CLASS,
    gvk::{KUBEADM_CONFIG_TEMPLATE, KUBEADM_CONTROL_PLANE_TEMPLATE, ResourceType},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterClassPatch {
    pub name: String,
    pub definitions: Vec<PatchDefinitionEntry>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchDefinitionEntry {
    pub selector: PatchSelector,
    pub json_patches: Vec<JsonPatch>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSelector {
    pub api_version: String,
    pub kind: String,
    pub match_resources: PatchSelectorMatch,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSelectorMatch {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub infrastructure_cluster: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub control_plane: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_deployment_class: Option<MachineDeploymentClassMatch>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MachineDeploymentClassMatch {
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPatch {
    pub op: String,
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<JsonPatchValue>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JsonPatchValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

impl PatchSelectorMatch {
    fn for_role(role: TargetRole) -> Self {
        match role {
            TargetRole::InfrastructureCluster => Self {
                infrastructure_cluster: true,
                ..Self::default()
            },
            TargetRole::ControlPlane | TargetRole::ControlPlaneInfrastructure => Self {
                control_plane: true,
                ..Self::default()
            },
            TargetRole::MachineDeploymentInfrastructure
            | TargetRole::MachineDeploymentBootstrapConfig => Self {
                machine_deployment_class: Some(MachineDeploymentClassMatch {
                    names: vec![DEFAULT_WORKER_CLASS.to_owned()],
                }),
                ..Self::default()
            },
        }
    }

    /// The control plane and machine deployment selectors cover two templates each, the kind
    /// tells them apart.
    fn role(&self, patch: &str, api_version: &str, kind: &str) -> Result<TargetRole, Error> {
        let is = |resource_type: ResourceType| {
            resource_type.api_version == api_version && resource_type.kind == kind
        };

        match (
            self.infrastructure_cluster,
            self.control_plane,
            self.machine_deployment_class.is_some(),
        ) {
            (true, false, false) => Ok(TargetRole::InfrastructureCluster),
            (false, true, false) if is(KUBEADM_CONTROL_PLANE_TEMPLATE) => {
                Ok(TargetRole::ControlPlane)
            }
            (false, true, false) => Ok(TargetRole::ControlPlaneInfrastructure),
            (false, false, true) if is(KUBEADM_CONFIG_TEMPLATE) => {
                Ok(TargetRole::MachineDeploymentBootstrapConfig)
            }
            (false, false, true) => Ok(TargetRole::MachineDeploymentInfrastructure),
            (false, false, false) => MissingSelectorRoleSnafu { patch }.fail(),
            _ => AmbiguousSelectorRoleSnafu { patch }.fail(),
        }
    }
}

impl From<PatchOperation> for JsonPatch {
    fn from(operation: PatchOperation) -> Self {
        let op = operation.op().to_owned();
        let (path, value) = match operation {
            PatchOperation::Add { path, value } | PatchOperation::Replace { path, value } => {
                (path, Some(value))
            }
            PatchOperation::Remove { path } => (path, None),
        };

        let (value, value_from) = match value {
            Some(PatchValue::Literal(value)) => (Some(value), None),
            Some(PatchValue::Variable(variable)) => (None, Some(JsonPatchValue {
                variable: Some(variable),
            })),
            None => (None, None),
        };

        Self {
            op,
            path,
            value,
            value_from,
        }
    }
}

impl TryFrom<JsonPatch> for PatchOperation {
    type Error = Error;

    fn try_from(patch: JsonPatch) -> Result<Self, Self::Error> {
        let JsonPatch {
            op,
            path,
            value,
            value_from,
        } = patch;

        parse_pointer(&path)?;

        let value = match (value, value_from) {
            (Some(value), None) => Some(PatchValue::Literal(value)),
            (
                None,
                Some(JsonPatchValue {
                    variable: Some(variable),
                }),
            ) => Some(PatchValue::Variable(variable)),
            (None, None) => None,
            _ => return InvalidOperationValueSnafu { op, path }.fail(),
        };

        match (op.as_str(), value) {
            ("add", Some(value)) => Ok(Self::Add { path, value }),
            ("replace", Some(value)) => Ok(Self::Replace { path, value }),
            ("remove", None) => Ok(Self::Remove { path }),
            ("remove", Some(_)) => UnexpectedOperationValueSnafu { path }.fail(),
            ("add" | "replace", None) => InvalidOperationValueSnafu { op, path }.fail(),
            _ => UnsupportedOperationSnafu { op }.fail(),
        }
    }
}

impl From<PatchDefinition> for ClusterClassPatch {
    fn from(patch: PatchDefinition) -> Self {
        let PatchDefinition {
            name,
            selector,
            operations,
        } = patch;

        Self {
            name,
            definitions: vec![PatchDefinitionEntry {
                selector: PatchSelector {
                    match_resources: PatchSelectorMatch::for_role(selector.role),
                    api_version: selector.api_version,
                    kind: selector.kind,
                },
                json_patches: operations.into_iter().map(JsonPatch::from).collect(),
            }],
        }
    }
}

impl TryFrom<ClusterClassPatch> for PatchDefinition {
    type Error = Error;

    fn try_from(patch: ClusterClassPatch) -> Result<Self, Self::Error> {
        let ClusterClassPatch { name, definitions } = patch;
        let count = definitions.len();

        ensure!(count == 1, super::UnsupportedDefinitionCountSnafu {
            patch: &name,
            count
        });

        let mut definitions = definitions.into_iter();
        let Some(PatchDefinitionEntry {
            selector,
            json_patches,
        }) = definitions.next()
        else {
            return super::UnsupportedDefinitionCountSnafu { patch: name, count }.fail();
        };

        let role = selector
            .match_resources
            .role(&name, &selector.api_version, &selector.kind)?;
        let operations = json_patches
            .into_iter()
            .map(PatchOperation::try_from)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name,
            selector: ResourceSelector {
                api_version: selector.api_version,
                kind: selector.kind,
                role,
            },
            operations,
        })
    }
}
