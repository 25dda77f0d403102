//! Applies the patches of a ClusterClass to the templates of a topology, the same way the Cluster
//! API topology controller does it.
//!
//! For every role of the topology the blueprint template is cloned and all matching patches are
//! applied to it in the order the ClusterClass defines them. Only the fields the patches changed
//! in `spec.template.spec` are then merged into the desired state, everything else the desired
//! state carries is kept.
use std::collections::BTreeMap;

use json_patch::{AddOperation, RemoveOperation, ReplaceOperation};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{DynamicObject, TypeMeta};
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, trace};

use crate::{
    crd::{ClusterClass, DEFAULT_WORKER_CLASS},
    patches::{self, PatchDefinition, PatchOperation, PatchTarget, PatchValue, TargetRole},
    templates,
    variables::{self, ClusterVariable, ResolvedVariables},
};

type Result<T, E = Error> = std::result::Result<T, E>;

const TEMPLATE_SPEC_POINTER: &str = "/spec/template/spec";
const TEMPLATE_SPEC_PATH: &[&str] = &["spec", "template", "spec"];
const OBJECT_SPEC_PATH: &[&str] = &["spec"];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve topology variables"))]
    ResolveVariables { source: variables::ResolveError },

    #[snafu(display("patch {patch:?} references variable {variable:?} which has no value"))]
    UnresolvedVariable { patch: String, variable: String },

    #[snafu(display("patch {patch:?} contains an invalid operation"))]
    InvalidOperation {
        patch: String,
        source: patches::Error,
    },

    #[snafu(display("failed to apply patch {patch:?} to the {role} template"))]
    ApplyPatch {
        patch: String,
        role: TargetRole,
        source: json_patch::PatchError,
    },

    #[snafu(display("failed to serialize the {role} template"))]
    SerializeTemplate {
        role: TargetRole,
        source: serde_json::Error,
    },

    #[snafu(display("the {role} template has no apiVersion and kind"))]
    MissingTypeMeta { role: TargetRole },

    #[snafu(display("the {role} template of kind {kind:?} is not a template"))]
    NotATemplate { role: TargetRole, kind: String },

    #[snafu(display("the {role} template has no spec.template.spec"))]
    MissingTemplateSpec { role: TargetRole },

    #[snafu(display("machine deployment class {class:?} is not defined by the ClusterClass"))]
    UnknownMachineDeploymentClass { class: String },
}

/// Applies the patches of a ClusterClass to a desired state.
pub trait PatchEngine {
    /// Mutates `desired` according to the patches of the blueprint's ClusterClass. On error
    /// `desired` is left untouched.
    fn apply(&self, blueprint: &Blueprint, desired: &mut DesiredState) -> Result<()>;
}

/// Everything the patches are computed from.
#[derive(Clone, Debug)]
pub struct Blueprint {
    pub cluster_class: ClusterClass,

    /// The topology variables supplied for the cluster.
    pub variables: Vec<ClusterVariable>,

    pub infrastructure_cluster_template: DynamicObject,
    pub control_plane: ControlPlaneBlueprint,

    /// Keyed by machine deployment class name.
    pub machine_deployments: BTreeMap<String, MachineDeploymentBlueprint>,
}

#[derive(Clone, Debug)]
pub struct ControlPlaneBlueprint {
    pub template: DynamicObject,
    pub infrastructure_machine_template: DynamicObject,
}

#[derive(Clone, Debug)]
pub struct MachineDeploymentBlueprint {
    pub bootstrap_template: DynamicObject,
    pub infrastructure_machine_template: DynamicObject,
}

impl Blueprint {
    /// Creates a blueprint using the [default templates](templates), named after the
    /// ClusterClass.
    pub fn with_default_templates(
        cluster_class: ClusterClass,
        variables: Vec<ClusterVariable>,
    ) -> Self {
        let metadata = &cluster_class.metadata;

        let machine_deployments = cluster_class
            .machine_deployment_classes()
            .map(|machine_deployment| {
                (machine_deployment.class.clone(), MachineDeploymentBlueprint {
                    bootstrap_template: templates::kubeadm_config_template(metadata),
                    infrastructure_machine_template: templates::openstack_machine_template(
                        metadata,
                    ),
                })
            })
            .collect();

        Self {
            infrastructure_cluster_template: templates::openstack_cluster_template(metadata),
            control_plane: ControlPlaneBlueprint {
                template: templates::kubeadm_control_plane_template(metadata),
                infrastructure_machine_template: templates::openstack_machine_template(metadata),
            },
            machine_deployments,
            variables,
            cluster_class,
        }
    }
}

/// The objects and templates of one cluster, as they are going to be applied.
#[derive(Clone, Debug)]
pub struct DesiredState {
    pub infrastructure_cluster: DynamicObject,
    pub control_plane: ControlPlaneState,

    /// Keyed by machine deployment class name.
    pub machine_deployments: BTreeMap<String, MachineDeploymentState>,
}

#[derive(Clone, Debug)]
pub struct ControlPlaneState {
    pub object: DynamicObject,
    pub infrastructure_machine_template: DynamicObject,
}

#[derive(Clone, Debug)]
pub struct MachineDeploymentState {
    pub bootstrap_template: DynamicObject,
    pub infrastructure_machine_template: DynamicObject,
}

impl DesiredState {
    /// Derives the initial desired state of the cluster `cluster_name` from the blueprint.
    ///
    /// The infrastructure cluster and control plane objects start out with the `spec.template.spec`
    /// of their template as `spec`, the templates are copies of the blueprint's ones.
    pub fn from_blueprint(blueprint: &Blueprint, cluster_name: &str) -> Result<Self> {
        let object = |role, template: &DynamicObject| -> Result<DynamicObject> {
            Ok(DynamicObject {
                types: Some(object_type(role, template)?),
                metadata: ObjectMeta {
                    name: Some(cluster_name.to_owned()),
                    namespace: template.metadata.namespace.clone(),
                    ..ObjectMeta::default()
                },
                data: serde_json::json!({ "spec": template_spec(role, template)? }),
            })
        };

        Ok(Self {
            infrastructure_cluster: object(
                TargetRole::InfrastructureCluster,
                &blueprint.infrastructure_cluster_template,
            )?,
            control_plane: ControlPlaneState {
                object: object(TargetRole::ControlPlane, &blueprint.control_plane.template)?,
                infrastructure_machine_template: blueprint
                    .control_plane
                    .infrastructure_machine_template
                    .clone(),
            },
            machine_deployments: blueprint
                .machine_deployments
                .iter()
                .map(|(class, machine_deployment)| {
                    (class.clone(), MachineDeploymentState {
                        bootstrap_template: machine_deployment.bootstrap_template.clone(),
                        infrastructure_machine_template: machine_deployment
                            .infrastructure_machine_template
                            .clone(),
                    })
                })
                .collect(),
        })
    }
}

/// The type of the object a template stamps out, `OpenStackClusterTemplate` creates
/// `OpenStackCluster`s.
fn object_type(role: TargetRole, template: &DynamicObject) -> Result<TypeMeta> {
    let types = template.types.as_ref().context(MissingTypeMetaSnafu { role })?;
    let kind = types
        .kind
        .strip_suffix("Template")
        .filter(|kind| !kind.is_empty())
        .context(NotATemplateSnafu {
            role,
            kind: &types.kind,
        })?;

    Ok(TypeMeta {
        api_version: types.api_version.clone(),
        kind: kind.to_owned(),
    })
}

/// A [`PatchEngine`] applying RFC 6902 JSON patches.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonPatchEngine;

impl PatchEngine for JsonPatchEngine {
    fn apply(&self, blueprint: &Blueprint, desired: &mut DesiredState) -> Result<()> {
        let spec = &blueprint.cluster_class.spec;
        let variables =
            variables::resolve(&spec.variables, &blueprint.variables).context(ResolveVariablesSnafu)?;
        let patches = &spec.patches;

        // Work on a copy, so that a failing patch doesn't leave a half patched state behind
        let mut next = desired.clone();

        let changes = template_changes(
            patches,
            &variables,
            TargetRole::InfrastructureCluster,
            &blueprint.infrastructure_cluster_template,
        )?;
        merge_into(&mut next.infrastructure_cluster, OBJECT_SPEC_PATH, &changes);

        let changes = template_changes(
            patches,
            &variables,
            TargetRole::ControlPlane,
            &blueprint.control_plane.template,
        )?;
        merge_into(&mut next.control_plane.object, OBJECT_SPEC_PATH, &changes);

        let changes = template_changes(
            patches,
            &variables,
            TargetRole::ControlPlaneInfrastructure,
            &blueprint.control_plane.infrastructure_machine_template,
        )?;
        merge_into(
            &mut next.control_plane.infrastructure_machine_template,
            TEMPLATE_SPEC_PATH,
            &changes,
        );

        for (class, state) in &mut next.machine_deployments {
            ensure!(
                blueprint.cluster_class.machine_deployment_class(class).is_some(),
                UnknownMachineDeploymentClassSnafu { class }
            );
            let machine_deployment = blueprint
                .machine_deployments
                .get(class)
                .context(UnknownMachineDeploymentClassSnafu { class })?;

            // Machine deployment selectors only ever match the default worker class
            if class != DEFAULT_WORKER_CLASS {
                continue;
            }

            let changes = template_changes(
                patches,
                &variables,
                TargetRole::MachineDeploymentBootstrapConfig,
                &machine_deployment.bootstrap_template,
            )?;
            merge_into(&mut state.bootstrap_template, TEMPLATE_SPEC_PATH, &changes);

            let changes = template_changes(
                patches,
                &variables,
                TargetRole::MachineDeploymentInfrastructure,
                &machine_deployment.infrastructure_machine_template,
            )?;
            merge_into(
                &mut state.infrastructure_machine_template,
                TEMPLATE_SPEC_PATH,
                &changes,
            );
        }

        *desired = next;
        Ok(())
    }
}

/// Applies all patches matching `role` to a copy of `template` and returns what they changed in
/// its `spec.template.spec`, as a merge patch.
fn template_changes(
    patches: &[PatchDefinition],
    variables: &ResolvedVariables,
    role: TargetRole,
    template: &DynamicObject,
) -> Result<Value> {
    let types = template.types.as_ref().context(MissingTypeMetaSnafu { role })?;
    let target = PatchTarget {
        api_version: &types.api_version,
        kind: &types.kind,
        role,
    };

    let original = template_spec(role, template)?;
    let mut document = serde_json::to_value(template).context(SerializeTemplateSnafu { role })?;

    apply_patches(&mut document, patches, variables, target)?;
    let patched = spec_at(&document, role)?;

    Ok(merge_patch(&original, &patched))
}

/// Applies every patch matching `target` to `document`, in order.
fn apply_patches(
    document: &mut Value,
    patches: &[PatchDefinition],
    variables: &ResolvedVariables,
    target: PatchTarget<'_>,
) -> Result<()> {
    let role = target.role;

    for patch in patches::matching(patches, target) {
        let operations = patch
            .operations
            .iter()
            .map(|operation| render_operation(patch, operation, variables))
            .collect::<Result<Vec<_>>>()?;

        for operation in &patch.operations {
            trace!(
                patch = %patch.name,
                %role,
                op = operation.op(),
                path = operation.path(),
                "applying patch operation"
            );
        }

        json_patch::patch(document, &operations).context(ApplyPatchSnafu {
            patch: &patch.name,
            role,
        })?;
        debug!(patch = %patch.name, %role, kind = target.kind, "applied patch");
    }

    Ok(())
}

fn spec_at(document: &Value, role: TargetRole) -> Result<Value> {
    document
        .pointer(TEMPLATE_SPEC_POINTER)
        .cloned()
        .context(MissingTemplateSpecSnafu { role })
}

/// The RFC 7396 merge patch turning `original` into `patched`. Fields missing from `patched`
/// become `null`, so a literal `null` can't be told apart from a removal.
fn merge_patch(original: &Value, patched: &Value) -> Value {
    let (Value::Object(original), Value::Object(patched)) = (original, patched) else {
        return patched.clone();
    };

    let mut changes: Map<String, Value> = original
        .keys()
        .filter(|name| !patched.contains_key(*name))
        .map(|name| (name.clone(), Value::Null))
        .collect();

    for (name, value) in patched {
        match original.get(name) {
            Some(previous) if previous == value => {}
            Some(previous) => {
                changes.insert(name.clone(), merge_patch(previous, value));
            }
            None => {
                changes.insert(name.clone(), value.clone());
            }
        }
    }

    Value::Object(changes)
}

/// Merges `changes` into the value at `path` of `object`. Fields the patches didn't touch keep
/// their desired value.
fn merge_into(object: &mut DynamicObject, path: &[&str], changes: &Value) {
    json_patch::merge(entry_mut(&mut object.data, path), changes);
}

/// Returns the value at `path` below `value`, creating empty objects on the way.
fn entry_mut<'a>(mut value: &'a mut Value, path: &[&str]) -> &'a mut Value {
    for segment in path {
        if !value.is_object() {
            *value = Value::Object(Map::new());
        }

        value = match value {
            Value::Object(fields) => fields
                .entry(*segment)
                .or_insert_with(|| Value::Object(Map::new())),
            other => other,
        };
    }

    value
}

fn template_spec(role: TargetRole, template: &DynamicObject) -> Result<Value> {
    spec_at(&template.data, role)
}

/// Turns an operation into a JSON patch operation, substituting variable references.
fn render_operation(
    patch: &PatchDefinition,
    operation: &PatchOperation,
    variables: &ResolvedVariables,
) -> Result<json_patch::PatchOperation> {
    let path = operation
        .pointer()
        .context(InvalidOperationSnafu { patch: &patch.name })?;

    let value = |value: &PatchValue| match value {
        PatchValue::Literal(value) => Ok(value.clone()),
        PatchValue::Variable(reference) => variables
            .lookup(reference)
            .cloned()
            .map(Value::from)
            .context(UnresolvedVariableSnafu {
                patch: &patch.name,
                variable: reference,
            }),
    };

    Ok(match operation {
        PatchOperation::Add { value: v, .. } => {
            json_patch::PatchOperation::Add(AddOperation {
                path,
                value: value(v)?,
            })
        }
        PatchOperation::Replace { value: v, .. } => {
            json_patch::PatchOperation::Replace(ReplaceOperation {
                path,
                value: value(v)?,
            })
        }
        PatchOperation::Remove { .. } => json_patch::PatchOperation::Remove(RemoveOperation { path }),
    })
}

#[cfg(test)]
mod tests;
