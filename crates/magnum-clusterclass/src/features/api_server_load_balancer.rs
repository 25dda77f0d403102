//! Configures the load balancer in front of the Kubernetes API server.
use serde::{Deserialize, Serialize};

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_CLUSTER_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "apiServerLoadBalancer";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerLoadBalancerConfig {
    pub enabled: bool,

    /// The Octavia provider, like `amphora` or `ovn`.
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub api_server_load_balancer: ApiServerLoadBalancerConfig,
}

pub struct Feature;

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        VARIABLE
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![VariableSchema::required(
            VARIABLE,
            SchemaProps::object()
                .with_required_property("enabled", SchemaProps::boolean())
                .with_required_property("provider", SchemaProps::string())
                .with_property("flavor", SchemaProps::string())
                .with_property("availabilityZone", SchemaProps::string()),
        )]
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        vec![
            PatchDefinition::new(
                VARIABLE,
                ResourceSelector::new(OPENSTACK_CLUSTER_TEMPLATE, TargetRole::InfrastructureCluster),
            )
            .with_operation(PatchOperation::add(
                "/spec/template/spec/apiServerLoadBalancer",
                PatchValue::variable(VARIABLE),
            )),
        ]
    }
}
