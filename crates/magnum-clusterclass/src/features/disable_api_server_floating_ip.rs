//! Allows to skip allocating a floating IP for the Kubernetes API server.
use serde::{Deserialize, Serialize};

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_CLUSTER_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "disableAPIServerFloatingIP";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Values {
    #[serde(rename = "disableAPIServerFloatingIP")]
    pub disable_api_server_floating_ip: bool,
}

pub struct Feature;

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        VARIABLE
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![VariableSchema::required(VARIABLE, SchemaProps::boolean())]
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        vec![
            PatchDefinition::new(
                VARIABLE,
                ResourceSelector::new(OPENSTACK_CLUSTER_TEMPLATE, TargetRole::InfrastructureCluster),
            )
            .with_operation(PatchOperation::add(
                "/spec/template/spec/disableAPIServerFloatingIP",
                PatchValue::variable(VARIABLE),
            )),
        ]
    }
}
