//! API versions and kinds of the Cluster API and Cluster API Provider OpenStack resources a
//! ClusterClass references.

use const_format::concatcp;
use kube::core::TypeMeta;

pub const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io";
pub const INFRASTRUCTURE_API_GROUP: &str = "infrastructure.cluster.x-k8s.io";
pub const CONTROL_PLANE_API_GROUP: &str = "controlplane.cluster.x-k8s.io";
pub const BOOTSTRAP_API_GROUP: &str = "bootstrap.cluster.x-k8s.io";

pub const CLUSTER_API_VERSION: &str = "v1beta1";
pub const OPENSTACK_API_VERSION: &str = "v1beta1";
pub const KUBEADM_API_VERSION: &str = "v1beta1";

/// The `apiVersion`/`kind` pair identifying the type of a Kubernetes resource.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ResourceType {
    pub api_version: &'static str,
    pub kind: &'static str,
}

impl ResourceType {
    /// Returns `true` if `types` describes this resource type.
    pub fn matches(&self, types: &TypeMeta) -> bool {
        types.api_version == self.api_version && types.kind == self.kind
    }

    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version.to_owned(),
            kind: self.kind.to_owned(),
        }
    }
}

pub const CLUSTER_CLASS: ResourceType = ResourceType {
    api_version: concatcp!(CLUSTER_API_GROUP, "/", CLUSTER_API_VERSION),
    kind: "ClusterClass",
};

pub const OPENSTACK_CLUSTER: ResourceType = ResourceType {
    api_version: concatcp!(INFRASTRUCTURE_API_GROUP, "/", OPENSTACK_API_VERSION),
    kind: "OpenStackCluster",
};

pub const OPENSTACK_CLUSTER_TEMPLATE: ResourceType = ResourceType {
    api_version: concatcp!(INFRASTRUCTURE_API_GROUP, "/", OPENSTACK_API_VERSION),
    kind: "OpenStackClusterTemplate",
};

pub const OPENSTACK_MACHINE_TEMPLATE: ResourceType = ResourceType {
    api_version: concatcp!(INFRASTRUCTURE_API_GROUP, "/", OPENSTACK_API_VERSION),
    kind: "OpenStackMachineTemplate",
};

pub const KUBEADM_CONTROL_PLANE: ResourceType = ResourceType {
    api_version: concatcp!(CONTROL_PLANE_API_GROUP, "/", KUBEADM_API_VERSION),
    kind: "KubeadmControlPlane",
};

pub const KUBEADM_CONTROL_PLANE_TEMPLATE: ResourceType = ResourceType {
    api_version: concatcp!(CONTROL_PLANE_API_GROUP, "/", KUBEADM_API_VERSION),
    kind: "KubeadmControlPlaneTemplate",
};

pub const KUBEADM_CONFIG_TEMPLATE: ResourceType = ResourceType {
    api_version: concatcp!(BOOTSTRAP_API_GROUP, "/", KUBEADM_API_VERSION),
    kind: "KubeadmConfigTemplate",
};
