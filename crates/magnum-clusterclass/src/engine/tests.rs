use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rstest::rstest;
use serde_json::json;

use super::*;
use crate::{
    builder::ClusterClassBuilder,
    feature::ClusterFeature,
    features,
    gvk::{KUBEADM_CONTROL_PLANE_TEMPLATE, OPENSTACK_CLUSTER_TEMPLATE, OPENSTACK_MACHINE_TEMPLATE},
    patches::ResourceSelector,
    variables::{SchemaProps, VariableSchema},
};

struct TestFeature {
    variables: Vec<VariableSchema>,
    patches: Vec<PatchDefinition>,
}

impl ClusterFeature for TestFeature {
    fn name(&self) -> &'static str {
        "test"
    }

    fn variables(&self) -> Vec<VariableSchema> {
        self.variables.clone()
    }

    fn patches(&self) -> Vec<PatchDefinition> {
        self.patches.clone()
    }
}

fn metadata() -> ObjectMeta {
    ObjectMeta {
        name: Some("magnum-v0.1.0".to_owned()),
        namespace: Some("magnum-system".to_owned()),
        ..ObjectMeta::default()
    }
}

fn blueprint(feature: TestFeature, variables: Vec<ClusterVariable>) -> Blueprint {
    let cluster_class = ClusterClassBuilder::new()
        .add_feature(&feature)
        .build(metadata())
        .unwrap();

    Blueprint::with_default_templates(cluster_class, variables)
}

fn apply(blueprint: &Blueprint) -> Result<DesiredState> {
    let mut desired = DesiredState::from_blueprint(blueprint, "kube-abcde").unwrap();
    JsonPatchEngine.apply(blueprint, &mut desired)?;

    Ok(desired)
}

fn cluster_patch(operations: Vec<PatchOperation>) -> PatchDefinition {
    PatchDefinition {
        name: "cluster".to_owned(),
        selector: ResourceSelector::new(
            OPENSTACK_CLUSTER_TEMPLATE,
            TargetRole::InfrastructureCluster,
        ),
        operations,
    }
}

#[test]
fn initial_desired_state() {
    let blueprint = blueprint(
        TestFeature {
            variables: Vec::new(),
            patches: Vec::new(),
        },
        Vec::new(),
    );
    let desired = DesiredState::from_blueprint(&blueprint, "kube-abcde").unwrap();

    let types = desired.infrastructure_cluster.types.as_ref().unwrap();
    assert_eq!(types.kind, "OpenStackCluster");
    assert_eq!(types.api_version, "infrastructure.cluster.x-k8s.io/v1beta1");
    assert_eq!(
        desired.infrastructure_cluster.metadata.name.as_deref(),
        Some("kube-abcde")
    );

    let types = desired.control_plane.object.types.as_ref().unwrap();
    assert_eq!(types.kind, "KubeadmControlPlane");

    assert_eq!(
        desired.machine_deployments.keys().collect::<Vec<_>>(),
        ["default-worker"]
    );
}

#[test]
fn copies_template_spec_without_patches() {
    let blueprint = blueprint(
        TestFeature {
            variables: Vec::new(),
            patches: Vec::new(),
        },
        Vec::new(),
    );
    let desired = apply(&blueprint).unwrap();

    assert_eq!(
        desired.infrastructure_cluster.data["spec"],
        blueprint.infrastructure_cluster_template.data["spec"]["template"]["spec"]
    );
    assert_eq!(
        desired.control_plane.object.data["spec"],
        blueprint.control_plane.template.data["spec"]["template"]["spec"]
    );
}

#[test]
fn keeps_desired_fields_outside_of_patches() {
    let blueprint = blueprint(
        TestFeature {
            variables: Vec::new(),
            patches: vec![PatchDefinition {
                name: "controlPlane".to_owned(),
                selector: ResourceSelector::new(
                    KUBEADM_CONTROL_PLANE_TEMPLATE,
                    TargetRole::ControlPlane,
                ),
                operations: vec![PatchOperation::replace(
                    "/spec/template/spec/kubeadmConfigSpec/clusterConfiguration/apiServer/extraArgs/cloud-provider",
                    PatchValue::literal("openstack"),
                )],
            }],
        },
        Vec::new(),
    );

    let mut desired = DesiredState::from_blueprint(&blueprint, "kube-abcde").unwrap();
    desired.control_plane.object.data = json!({
        "spec": {
            "replicas": 3,
            "version": "v1.21.2",
        }
    });
    JsonPatchEngine.apply(&blueprint, &mut desired).unwrap();

    let spec = &desired.control_plane.object.data["spec"];
    assert_eq!(spec["replicas"], 3);
    assert_eq!(spec["version"], "v1.21.2");
    assert_eq!(
        spec["kubeadmConfigSpec"]["clusterConfiguration"]["apiServer"]["extraArgs"]
            ["cloud-provider"],
        "openstack"
    );
}

#[test]
fn merge_patch_contains_only_changes() {
    let original = json!({
        "flavor": "PLACEHOLDER",
        "image": {"name": "ubuntu"},
        "sshKeyName": "default",
        "tags": ["a"],
    });
    let patched = json!({
        "flavor": "m1.large",
        "image": {"id": "1234"},
        "tags": ["a"],
    });

    assert_eq!(
        merge_patch(&original, &patched),
        json!({
            "flavor": "m1.large",
            "image": {"name": null, "id": "1234"},
            "sshKeyName": null,
        })
    );
    assert_eq!(merge_patch(&patched, &patched), json!({}));
}

#[rstest]
#[case::external_network(
    &features::external_network::Feature,
    ClusterVariable::new(features::external_network::VARIABLE, "public"),
    TargetRole::InfrastructureCluster,
    templates::openstack_cluster_template(&metadata()),
)]
#[case::control_plane_image(
    &features::images::Feature,
    ClusterVariable::new(features::images::VARIABLE, "0f6e2c4d-1b5a-4c8e-9a3f-2d7b8e6c1a90"),
    TargetRole::ControlPlaneInfrastructure,
    templates::openstack_machine_template(&metadata()),
)]
#[case::worker_image(
    &features::images::Feature,
    ClusterVariable::new(features::images::VARIABLE, "0f6e2c4d-1b5a-4c8e-9a3f-2d7b8e6c1a90"),
    TargetRole::MachineDeploymentInfrastructure,
    templates::openstack_machine_template(&metadata()),
)]
fn reapplying_operations_to_patched_template_is_stable(
    #[case] feature: &dyn ClusterFeature,
    #[case] variable: ClusterVariable,
    #[case] role: TargetRole,
    #[case] template: DynamicObject,
) {
    let cluster_class = ClusterClassBuilder::new()
        .add_feature(feature)
        .build(metadata())
        .unwrap();
    let spec = &cluster_class.spec;
    let variables = variables::resolve(&spec.variables, &[variable]).unwrap();

    let types = template.types.as_ref().unwrap();
    let target = PatchTarget {
        api_version: &types.api_version,
        kind: &types.kind,
        role,
    };

    let mut document = serde_json::to_value(&template).unwrap();
    apply_patches(&mut document, &spec.patches, &variables, target).unwrap();
    let once = document.clone();
    assert_ne!(once, serde_json::to_value(&template).unwrap());

    apply_patches(&mut document, &spec.patches, &variables, target).unwrap();
    assert_eq!(document, once);
}

#[test]
fn applies_literals_and_variables() {
    let blueprint = blueprint(
        TestFeature {
            variables: vec![VariableSchema::required(
                "externalNetworkId",
                SchemaProps::string(),
            )],
            patches: vec![cluster_patch(vec![
                PatchOperation::add(
                    "/spec/template/spec/externalNetwork",
                    PatchValue::literal(json!({})),
                ),
                PatchOperation::add(
                    "/spec/template/spec/externalNetwork/id",
                    PatchValue::variable("externalNetworkId"),
                ),
                PatchOperation::remove("/spec/template/spec/managedSecurityGroups"),
            ])],
        },
        vec![ClusterVariable::new("externalNetworkId", "public")],
    );
    let desired = apply(&blueprint).unwrap();

    let spec = &desired.infrastructure_cluster.data["spec"];
    assert_eq!(spec["externalNetwork"], json!({"id": "public"}));
    assert!(spec.get("managedSecurityGroups").is_none());
    assert_eq!(spec["identityRef"]["name"], "PLACEHOLDER");
}

#[test]
fn patches_only_the_selected_role() {
    let blueprint = blueprint(
        TestFeature {
            variables: vec![VariableSchema::required("flavor", SchemaProps::string())],
            patches: vec![PatchDefinition {
                name: "flavor".to_owned(),
                selector: ResourceSelector::new(
                    OPENSTACK_MACHINE_TEMPLATE,
                    TargetRole::MachineDeploymentInfrastructure,
                ),
                operations: vec![PatchOperation::add(
                    "/spec/template/spec/flavor",
                    PatchValue::variable("flavor"),
                )],
            }],
        },
        vec![ClusterVariable::new("flavor", "m1.large")],
    );
    let desired = apply(&blueprint).unwrap();

    let workers = &desired.machine_deployments[DEFAULT_WORKER_CLASS];
    assert_eq!(
        workers.infrastructure_machine_template.data["spec"]["template"]["spec"]["flavor"],
        "m1.large"
    );
    assert_eq!(
        desired.control_plane.infrastructure_machine_template.data["spec"]["template"]["spec"]
            ["flavor"],
        "PLACEHOLDER"
    );
}

#[test]
fn patches_control_plane_object() {
    let blueprint = blueprint(
        TestFeature {
            variables: Vec::new(),
            patches: vec![PatchDefinition {
                name: "controlPlane".to_owned(),
                selector: ResourceSelector::new(
                    KUBEADM_CONTROL_PLANE_TEMPLATE,
                    TargetRole::ControlPlane,
                ),
                operations: vec![PatchOperation::replace(
                    "/spec/template/spec/kubeadmConfigSpec/clusterConfiguration/apiServer/extraArgs/cloud-provider",
                    PatchValue::literal("openstack"),
                )],
            }],
        },
        Vec::new(),
    );
    let desired = apply(&blueprint).unwrap();

    assert_eq!(
        desired.control_plane.object.data["spec"]["kubeadmConfigSpec"]["clusterConfiguration"]
            ["apiServer"]["extraArgs"]["cloud-provider"],
        "openstack"
    );
}

#[test]
fn failing_patch_leaves_desired_state_untouched() {
    let blueprint = blueprint(
        TestFeature {
            variables: Vec::new(),
            patches: vec![cluster_patch(vec![
                PatchOperation::add("/spec/template/spec/disableAPIServerFloatingIP", PatchValue::literal(true)),
                PatchOperation::replace("/spec/template/spec/bastion/enabled", PatchValue::literal(true)),
            ])],
        },
        Vec::new(),
    );

    let mut desired = DesiredState::from_blueprint(&blueprint, "kube-abcde").unwrap();
    let before = desired.clone();

    let err = JsonPatchEngine.apply(&blueprint, &mut desired).unwrap_err();
    assert!(matches!(err, Error::ApplyPatch { role: TargetRole::InfrastructureCluster, .. }));
    assert_eq!(desired.infrastructure_cluster.data, before.infrastructure_cluster.data);
}

#[test]
fn resolution_errors() {
    let feature = || TestFeature {
        variables: vec![
            VariableSchema::required("externalNetworkId", SchemaProps::string()),
            VariableSchema::optional("sshKeyName", SchemaProps::string()),
        ],
        patches: vec![cluster_patch(vec![PatchOperation::add(
            "/spec/template/spec/sshKeyName",
            PatchValue::variable("sshKeyName"),
        )])],
    };

    let err = apply(&blueprint(feature(), Vec::new())).unwrap_err();
    assert!(matches!(
        err,
        Error::ResolveVariables {
            source: variables::ResolveError::MissingRequiredVariable { .. }
        }
    ));

    let err = apply(&blueprint(feature(), vec![ClusterVariable::new(
        "externalNetworkId",
        "public",
    )]))
    .unwrap_err();
    assert!(matches!(err, Error::UnresolvedVariable { ref variable, .. } if variable == "sshKeyName"));
}

#[test]
fn unknown_machine_deployment_class() {
    let blueprint = blueprint(
        TestFeature {
            variables: Vec::new(),
            patches: Vec::new(),
        },
        Vec::new(),
    );

    let mut desired = DesiredState::from_blueprint(&blueprint, "kube-abcde").unwrap();
    let workers = desired.machine_deployments[DEFAULT_WORKER_CLASS].clone();
    desired.machine_deployments.insert("gpu-worker".to_owned(), workers);

    let err = JsonPatchEngine.apply(&blueprint, &mut desired).unwrap_err();
    assert!(matches!(err, Error::UnknownMachineDeploymentClass { ref class } if class == "gpu-worker"));
}
