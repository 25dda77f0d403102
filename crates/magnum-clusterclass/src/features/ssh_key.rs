//! Injects an SSH key pair into all machines.
use serde::{Deserialize, Serialize};

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_MACHINE_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "sshKeyName";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub ssh_key_name: String,
}

pub struct Feature;

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        VARIABLE
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![VariableSchema::required(VARIABLE, SchemaProps::string())]
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        [
            ("ControlPlane", TargetRole::ControlPlaneInfrastructure),
            ("Workers", TargetRole::MachineDeploymentInfrastructure),
        ]
        .into_iter()
        .map(|(suffix, role)| {
            PatchDefinition::new(
                format!("{VARIABLE}{suffix}"),
                ResourceSelector::new(OPENSTACK_MACHINE_TEMPLATE, role),
            )
            .with_operation(PatchOperation::add(
                "/spec/template/spec/sshKeyName",
                PatchValue::variable(VARIABLE),
            ))
        })
        .collect()
    }
}
