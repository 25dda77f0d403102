//! Points all OpenStack resources at the secret holding the cloud credentials of the cluster.
use serde::{Deserialize, Serialize};

use crate::{
    feature::ClusterFeature,
    gvk::{OPENSTACK_CLUSTER_TEMPLATE, OPENSTACK_MACHINE_TEMPLATE},
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "clusterIdentityRefName";

const IDENTITY_REF_NAME_PATH: &str = "/spec/template/spec/identityRef/name";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub cluster_identity_ref_name: String,
}

pub struct Feature;

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        VARIABLE
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![VariableSchema::required(VARIABLE, SchemaProps::string())]
    }

    // The machine templates already carry an identity reference, so it is replaced there
    fn patches(&self) -> Vec<PatchDefinition> {
        vec![
            PatchDefinition::new(
                VARIABLE,
                ResourceSelector::new(OPENSTACK_CLUSTER_TEMPLATE, TargetRole::InfrastructureCluster),
            )
            .with_operation(PatchOperation::add(
                IDENTITY_REF_NAME_PATH,
                PatchValue::variable(VARIABLE),
            )),
            PatchDefinition::new(
                format!("{VARIABLE}ControlPlane"),
                ResourceSelector::new(
                    OPENSTACK_MACHINE_TEMPLATE,
                    TargetRole::ControlPlaneInfrastructure,
                ),
            )
            .with_operation(PatchOperation::replace(
                IDENTITY_REF_NAME_PATH,
                PatchValue::variable(VARIABLE),
            )),
            PatchDefinition::new(
                format!("{VARIABLE}Workers"),
                ResourceSelector::new(
                    OPENSTACK_MACHINE_TEMPLATE,
                    TargetRole::MachineDeploymentInfrastructure,
                ),
            )
            .with_operation(PatchOperation::replace(
                IDENTITY_REF_NAME_PATH,
                PatchValue::variable(VARIABLE),
            )),
        ]
    }
}
