//! Assembles a [`ClusterClass`] out of a fixed topology skeleton and the variables and patches of
//! every registered feature.
use std::collections::{HashMap, hash_map::Entry};

use k8s_openapi::{
    api::core::v1::ObjectReference,
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use magnum_shared::time::Duration;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, warn};

use crate::{
    crd::{
        ClusterClass, ClusterClassSpec, ConditionStatus, ControlPlaneClass, DEFAULT_WORKER_CLASS,
        LocalObjectTemplate, MachineDeploymentClass, MachineDeploymentClassTemplate,
        MachineHealthCheckClass, UnhealthyCondition, WorkersClass,
    },
    feature::{ClusterFeature, FeatureRegistry},
    gvk::{
        KUBEADM_CONFIG_TEMPLATE, KUBEADM_CONTROL_PLANE_TEMPLATE, OPENSTACK_CLUSTER_TEMPLATE,
        OPENSTACK_MACHINE_TEMPLATE, ResourceType,
    },
    patches::{self, PatchDefinition, ResourceSelector},
    variables::{SchemaError, VariableSchema},
};

/// How long the `Ready` condition may be `False` or `Unknown` before a machine is remediated.
pub const UNHEALTHY_TIMEOUT: Duration = Duration::from_minutes(5);
pub const NODE_VOLUME_DETACH_TIMEOUT: Duration = Duration::from_minutes(5);
pub const MAX_UNHEALTHY: &str = "80%";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("ClusterClass metadata must contain a name"))]
    MissingName,

    #[snafu(display("variable {name:?} is declared by both feature {first:?} and {second:?}"))]
    DuplicateVariable {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[snafu(display("patch {name:?} is defined by both feature {first:?} and {second:?}"))]
    DuplicatePatch {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[snafu(display("schema of variable {name:?} of feature {feature:?} is invalid"))]
    InvalidSchema {
        name: String,
        feature: &'static str,
        source: SchemaError,
    },

    #[snafu(display("patch {name:?} of feature {feature:?} is invalid"))]
    InvalidPatchPath {
        name: String,
        feature: &'static str,
        source: patches::Error,
    },

    #[snafu(display(
        "patch {patch:?} of feature {feature:?} references undeclared variable {variable:?}"
    ))]
    UndeclaredVariableReference {
        patch: String,
        feature: &'static str,
        variable: String,
    },
}

/// A variable or patch together with the name of the feature contributing it.
#[derive(Clone, Debug)]
struct Contribution<T> {
    feature: &'static str,
    item: T,
}

/// Collects the contributions of features and builds [`ClusterClass`]es out of them.
#[derive(Clone, Debug, Default)]
pub struct ClusterClassBuilder {
    variables: Vec<Contribution<VariableSchema>>,
    patches: Vec<Contribution<PatchDefinition>>,
}

impl ClusterClassBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the contributions of every feature of `registry`, in registration order.
    pub fn from_registry(registry: &FeatureRegistry) -> Self {
        let mut builder = Self::new();
        for feature in registry.all() {
            builder.add_feature(feature.as_ref());
        }

        builder
    }

    pub fn add_feature(&mut self, feature: &dyn ClusterFeature) -> &mut Self {
        let name = feature.name();

        self.variables
            .extend(feature.variables().into_iter().map(|item| Contribution {
                feature: name,
                item,
            }));
        self.patches
            .extend(feature.patches().into_iter().map(|item| Contribution {
                feature: name,
                item,
            }));

        self
    }

    /// Builds the ClusterClass described by `metadata`.
    ///
    /// Every template the ClusterClass references shares its name and namespace. The variables
    /// and patches of all features are validated first, no document is produced if any of them
    /// is invalid.
    pub fn build(&self, metadata: ObjectMeta) -> Result<ClusterClass> {
        metadata.name.as_ref().context(MissingNameSnafu)?;

        self.validate_variables()?;
        self.validate_patches()?;
        self.warn_on_overlapping_paths();

        let machine_deployment = MachineDeploymentClass {
            class: DEFAULT_WORKER_CLASS.to_owned(),
            template: MachineDeploymentClassTemplate {
                bootstrap: local_template(KUBEADM_CONFIG_TEMPLATE, &metadata),
                infrastructure: local_template(OPENSTACK_MACHINE_TEMPLATE, &metadata),
            },
            machine_health_check: machine_health_check(),
            node_volume_detach_timeout: NODE_VOLUME_DETACH_TIMEOUT,
        };

        let spec = ClusterClassSpec {
            infrastructure: local_template(OPENSTACK_CLUSTER_TEMPLATE, &metadata),
            control_plane: ControlPlaneClass {
                reference: template_reference(KUBEADM_CONTROL_PLANE_TEMPLATE, &metadata),
                machine_infrastructure: local_template(OPENSTACK_MACHINE_TEMPLATE, &metadata),
                machine_health_check: machine_health_check(),
                node_volume_detach_timeout: NODE_VOLUME_DETACH_TIMEOUT,
            },
            workers: WorkersClass {
                machine_deployments: vec![machine_deployment],
            },
            variables: self.variables.iter().map(|v| v.item.clone()).collect(),
            patches: self.patches.iter().map(|p| p.item.clone()).collect(),
        };

        debug!(
            name = metadata.name.as_deref(),
            namespace = metadata.namespace.as_deref(),
            variables = spec.variables.len(),
            patches = spec.patches.len(),
            "built ClusterClass"
        );

        Ok(ClusterClass { metadata, spec })
    }

    fn validate_variables(&self) -> Result<()> {
        let mut declared_by = HashMap::new();

        for Contribution { feature, item } in &self.variables {
            item.schema.validate().context(InvalidSchemaSnafu {
                name: &item.name,
                feature: *feature,
            })?;

            if let Some(first) = declared_by.insert(item.name.as_str(), *feature) {
                return DuplicateVariableSnafu {
                    name: &item.name,
                    first,
                    second: *feature,
                }
                .fail();
            }
        }

        Ok(())
    }

    fn validate_patches(&self) -> Result<()> {
        let mut defined_by = HashMap::new();

        for Contribution { feature, item } in &self.patches {
            if let Some(first) = defined_by.insert(item.name.as_str(), *feature) {
                return DuplicatePatchSnafu {
                    name: &item.name,
                    first,
                    second: *feature,
                }
                .fail();
            }

            item.validate().context(InvalidPatchPathSnafu {
                name: &item.name,
                feature: *feature,
            })?;

            for reference in item.variable_references() {
                let variable = reference.split('.').next().unwrap_or(reference);
                if !self.variables.iter().any(|v| v.item.name == variable) {
                    return UndeclaredVariableReferenceSnafu {
                        patch: &item.name,
                        feature: *feature,
                        variable,
                    }
                    .fail();
                }
            }
        }

        Ok(())
    }

    /// Patches are applied in order, so when two features touch the same path of the same
    /// resource the later one wins.
    fn warn_on_overlapping_paths(&self) {
        let mut touched_by: HashMap<(&ResourceSelector, &str), &'static str> = HashMap::new();

        for Contribution { feature, item } in &self.patches {
            for operation in &item.operations {
                match touched_by.entry((&item.selector, operation.path())) {
                    Entry::Occupied(entry) if entry.get() != feature => warn!(
                        path = operation.path(),
                        kind = item.selector.kind.as_str(),
                        role = %item.selector.role,
                        first = entry.get(),
                        second = feature,
                        "features patch the same path, the later one takes precedence"
                    ),
                    Entry::Occupied(_) => {}
                    Entry::Vacant(entry) => {
                        entry.insert(feature);
                    }
                }
            }
        }
    }
}

fn machine_health_check() -> MachineHealthCheckClass {
    MachineHealthCheckClass {
        unhealthy_conditions: [ConditionStatus::False, ConditionStatus::Unknown]
            .into_iter()
            .map(|status| UnhealthyCondition {
                type_: "Ready".to_owned(),
                status,
                timeout: UNHEALTHY_TIMEOUT,
            })
            .collect(),
        max_unhealthy: IntOrString::String(MAX_UNHEALTHY.to_owned()),
    }
}

fn template_reference(resource_type: ResourceType, metadata: &ObjectMeta) -> ObjectReference {
    ObjectReference {
        api_version: Some(resource_type.api_version.to_owned()),
        kind: Some(resource_type.kind.to_owned()),
        name: metadata.name.clone(),
        namespace: metadata.namespace.clone(),
        ..ObjectReference::default()
    }
}

fn local_template(resource_type: ResourceType, metadata: &ObjectMeta) -> LocalObjectTemplate {
    LocalObjectTemplate {
        reference: template_reference(resource_type, metadata),
    }
}
