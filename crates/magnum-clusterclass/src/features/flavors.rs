//! Sets the Nova flavors of the control plane and worker machines.
use serde::{Deserialize, Serialize};

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_MACHINE_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const CONTROL_PLANE_VARIABLE: &str = "controlPlaneFlavor";
pub const WORKER_VARIABLE: &str = "flavor";

const FLAVOR_PATH: &str = "/spec/template/spec/flavor";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub control_plane_flavor: String,
    pub flavor: String,
}

pub struct Feature;

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        "flavors"
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![
            VariableSchema::required(CONTROL_PLANE_VARIABLE, SchemaProps::string()),
            VariableSchema::required(WORKER_VARIABLE, SchemaProps::string()),
        ]
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        vec![
            PatchDefinition::new(
                CONTROL_PLANE_VARIABLE,
                ResourceSelector::new(
                    OPENSTACK_MACHINE_TEMPLATE,
                    TargetRole::ControlPlaneInfrastructure,
                ),
            )
            .with_operation(PatchOperation::add(
                FLAVOR_PATH,
                PatchValue::variable(CONTROL_PLANE_VARIABLE),
            )),
            PatchDefinition::new(
                WORKER_VARIABLE,
                ResourceSelector::new(
                    OPENSTACK_MACHINE_TEMPLATE,
                    TargetRole::MachineDeploymentInfrastructure,
                ),
            )
            .with_operation(PatchOperation::add(
                FLAVOR_PATH,
                PatchValue::variable(WORKER_VARIABLE),
            )),
        ]
    }
}
