//! Boots all machines from the same Glance image.
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    feature::ClusterFeature,
    gvk::OPENSTACK_MACHINE_TEMPLATE,
    patches::{PatchDefinition, PatchOperation, PatchValue, ResourceSelector, TargetRole},
    variables::{SchemaProps, VariableSchema},
};

pub const VARIABLE: &str = "imageUUID";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Values {
    #[serde(rename = "imageUUID")]
    pub image_uuid: String,
}

pub struct Feature;

fn image_patch(name: &str, role: TargetRole) -> PatchDefinition {
    PatchDefinition::new(name, ResourceSelector::new(OPENSTACK_MACHINE_TEMPLATE, role))
        .with_operation(PatchOperation::add(
            "/spec/template/spec/image",
            PatchValue::literal(json!({})),
        ))
        .with_operation(PatchOperation::add(
            "/spec/template/spec/image/id",
            PatchValue::variable(VARIABLE),
        ))
}

impl ClusterFeature for Feature {
    fn name(&self) -> &'static str {
        "images"
    }

    fn variables(&self) -> Vec<VariableSchema> {
        vec![VariableSchema::required(VARIABLE, SchemaProps::string())]
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        vec![
            image_patch("imagesControlPlane", TargetRole::ControlPlaneInfrastructure),
            image_patch("imagesWorkers", TargetRole::MachineDeploymentInfrastructure),
        ]
    }
}
