//! Spreads the control plane machines across availability zones.
use serde::{Deserialize, Serialize};

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_CLUSTER_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "controlPlaneAvailabilityZones";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub control_plane_availability_zones: Vec<String>,
}

pub struct Feature;

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        VARIABLE
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![VariableSchema::required(
            VARIABLE,
            SchemaProps::array(SchemaProps::string()),
        )]
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        vec![
            PatchDefinition::new(
                VARIABLE,
                ResourceSelector::new(OPENSTACK_CLUSTER_TEMPLATE, TargetRole::InfrastructureCluster),
            )
            .with_operation(PatchOperation::add(
                "/spec/template/spec/controlPlaneAvailabilityZones",
                PatchValue::variable(VARIABLE),
            )),
        ]
    }
}
