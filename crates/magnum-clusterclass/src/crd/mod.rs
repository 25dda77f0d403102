//! The subset of the Cluster API `ClusterClass` resource (`cluster.x-k8s.io/v1beta1`) which is
//! generated by this crate.
use k8s_openapi::{
    api::core::v1::ObjectReference, apimachinery::pkg::util::intstr::IntOrString,
};
use kube::CustomResource;
use magnum_shared::time::Duration;
use serde::{Deserialize, Serialize};

use crate::{patches::PatchDefinition, variables::VariableSchema};

/// The class name of the single worker machine deployment class.
pub const DEFAULT_WORKER_CLASS: &str = "default-worker";

#[derive(Clone, CustomResource, Debug, Deserialize, PartialEq, Serialize)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "ClusterClass",
    plural = "clusterclasses",
    namespaced,
    schema = "disabled",
    derive = "PartialEq",
    crates(kube_core = "kube::core", k8s_openapi = "k8s_openapi")
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterClassSpec {
    pub infrastructure: LocalObjectTemplate,
    pub control_plane: ControlPlaneClass,
    pub workers: WorkersClass,

    #[serde(default)]
    pub variables: Vec<VariableSchema>,

    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

/// A reference to a template living in the namespace of the ClusterClass.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LocalObjectTemplate {
    #[serde(rename = "ref")]
    pub reference: ObjectReference,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneClass {
    #[serde(rename = "ref")]
    pub reference: ObjectReference,

    pub machine_infrastructure: LocalObjectTemplate,
    pub machine_health_check: MachineHealthCheckClass,
    pub node_volume_detach_timeout: Duration,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkersClass {
    pub machine_deployments: Vec<MachineDeploymentClass>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentClass {
    pub class: String,
    pub template: MachineDeploymentClassTemplate,
    pub machine_health_check: MachineHealthCheckClass,
    pub node_volume_detach_timeout: Duration,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MachineDeploymentClassTemplate {
    pub bootstrap: LocalObjectTemplate,
    pub infrastructure: LocalObjectTemplate,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineHealthCheckClass {
    pub unhealthy_conditions: Vec<UnhealthyCondition>,
    pub max_unhealthy: IntOrString,
}

/// A node is considered unhealthy once the condition `type` had the given `status` for at least
/// `timeout`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct UnhealthyCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub timeout: Duration,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, strum::Display)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ClusterClass {
    /// Iterates over the machine deployment classes of this ClusterClass.
    pub fn machine_deployment_classes(&self) -> impl Iterator<Item = &MachineDeploymentClass> {
        self.spec.workers.machine_deployments.iter()
    }

    pub fn machine_deployment_class(&self, class: &str) -> Option<&MachineDeploymentClass> {
        self.machine_deployment_classes()
            .find(|machine_deployment| machine_deployment.class == class)
    }
}
