//! Applies the patches of a single feature to the default templates, for assertions in the
//! feature tests.
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde_json::Value;

use crate::{
    builder::ClusterClassBuilder,
    crd::DEFAULT_WORKER_CLASS,
    engine::{Blueprint, DesiredState, JsonPatchEngine, PatchEngine},
    feature::ClusterFeature,
    variables::ClusterVariable,
};

pub const CLUSTER_NAME: &str = "kube-abcde";

/// Builds a ClusterClass containing only `feature` and applies its patches using `values` as
/// topology variables.
pub fn validate_patch(feature: &dyn ClusterFeature, values: &impl Serialize) -> DesiredState {
    let cluster_class = ClusterClassBuilder::new()
        .add_feature(feature)
        .build(ObjectMeta {
            name: Some("cluster-class".to_owned()),
            namespace: Some("default".to_owned()),
            ..ObjectMeta::default()
        })
        .expect("feature must build a valid ClusterClass");

    let variables = ClusterVariable::from_values(values).expect("values must be an object");
    let blueprint = Blueprint::with_default_templates(cluster_class, variables);

    let mut desired = DesiredState::from_blueprint(&blueprint, CLUSTER_NAME).unwrap();
    JsonPatchEngine
        .apply(&blueprint, &mut desired)
        .expect("patches must apply");

    desired
}

pub fn infrastructure_cluster_spec(desired: &DesiredState) -> &Value {
    &desired.infrastructure_cluster.data["spec"]
}

pub fn control_plane_machine_spec(desired: &DesiredState) -> &Value {
    &desired.control_plane.infrastructure_machine_template.data["spec"]["template"]["spec"]
}

pub fn worker_machine_spec(desired: &DesiredState) -> &Value {
    &desired.machine_deployments[DEFAULT_WORKER_CLASS]
        .infrastructure_machine_template
        .data["spec"]["template"]["spec"]
}
