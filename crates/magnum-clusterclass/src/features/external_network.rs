//! Selects the external network floating IPs and routers are allocated from.
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_CLUSTER_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "externalNetworkId";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub external_network_id: String,
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
        vec![
            PatchDefinition::new(
                VARIABLE,
                ResourceSelector::new(OPENSTACK_CLUSTER_TEMPLATE, TargetRole::InfrastructureCluster),
            )
            .with_operation(PatchOperation::add(
                "/spec/template/spec/externalNetwork",
                PatchValue::literal(json!({})),
            ))
            .with_operation(PatchOperation::add(
                "/spec/template/spec/externalNetwork/id",
                PatchValue::variable(VARIABLE),
            )),
        ]
    }
}
