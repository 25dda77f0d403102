//! Default templates referenced by the generated ClusterClass. Every template is named after the
//! ClusterClass itself.
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use serde_json::json;

use crate::gvk::{
    KUBEADM_CONFIG_TEMPLATE, KUBEADM_CONTROL_PLANE_TEMPLATE, OPENSTACK_CLUSTER_TEMPLATE,
    OPENSTACK_MACHINE_TEMPLATE, ResourceType,
};

/// Placeholder for values which are always set by a patch.
pub const PLACEHOLDER: &str = "PLACEHOLDER";

/// The cloud entry of the `clouds.yaml` in the identity secret.
pub const CLOUD_NAME: &str = "default";

pub const NODE_PORT_RANGE_MIN: u16 = 30000;
pub const NODE_PORT_RANGE_MAX: u16 = 32767;

fn template(resource_type: ResourceType, metadata: &ObjectMeta, spec: serde_json::Value) -> DynamicObject {
    DynamicObject {
        types: Some(resource_type.type_meta()),
        metadata: ObjectMeta {
            name: metadata.name.clone(),
            namespace: metadata.namespace.clone(),
            ..ObjectMeta::default()
        },
        data: json!({
            "spec": {
                "template": {
                    "spec": spec,
                },
            },
        }),
    }
}

fn identity_ref() -> serde_json::Value {
    json!({
        "name": PLACEHOLDER,
        "cloudName": CLOUD_NAME,
    })
}

fn node_port_rule(protocol: &str) -> serde_json::Value {
    json!({
        "name": format!("Node Port ({}, anywhere)", protocol.to_uppercase()),
        "direction": "ingress",
        "etherType": "IPv4",
        "portRangeMin": NODE_PORT_RANGE_MIN,
        "portRangeMax": NODE_PORT_RANGE_MAX,
        "protocol": protocol,
        "remoteIPPrefix": "0.0.0.0/0",
    })
}

pub fn openstack_cluster_template(metadata: &ObjectMeta) -> DynamicObject {
    template(OPENSTACK_CLUSTER_TEMPLATE, metadata, json!({
        "identityRef": identity_ref(),
        "apiServerLoadBalancer": {},
        "managedSecurityGroups": {
            "allowAllInClusterTraffic": true,
            "allNodesSecurityGroupRules": [
                node_port_rule("udp"),
                node_port_rule("tcp"),
            ],
        },
    }))
}

pub fn openstack_machine_template(metadata: &ObjectMeta) -> DynamicObject {
    template(OPENSTACK_MACHINE_TEMPLATE, metadata, json!({
        "identityRef": identity_ref(),
        "flavor": PLACEHOLDER,
    }))
}

pub fn kubeadm_control_plane_template(metadata: &ObjectMeta) -> DynamicObject {
    template(KUBEADM_CONTROL_PLANE_TEMPLATE, metadata, json!({
        "kubeadmConfigSpec": {
            "clusterConfiguration": {
                "apiServer": {
                    "extraArgs": {
                        "cloud-provider": "external",
                    },
                },
            },
            "initConfiguration": {
                "nodeRegistration": {
                    "name": "{{ local_hostname }}",
                    "kubeletExtraArgs": {
                        "cloud-provider": "external",
                    },
                },
            },
            "joinConfiguration": {
                "nodeRegistration": {
                    "name": "{{ local_hostname }}",
                    "kubeletExtraArgs": {
                        "cloud-provider": "external",
                    },
                },
            },
        },
    }))
}

pub fn kubeadm_config_template(metadata: &ObjectMeta) -> DynamicObject {
    template(KUBEADM_CONFIG_TEMPLATE, metadata, json!({
        "joinConfiguration": {
            "nodeRegistration": {
                "name": "{{ local_hostname }}",
                "kubeletExtraArgs": {
                    "cloud-provider": "external",
                },
            },
        },
    }))
}

/// All default templates in the order they are referenced by the ClusterClass.
pub fn all(metadata: &ObjectMeta) -> Vec<DynamicObject> {
    vec![
        openstack_cluster_template(metadata),
        kubeadm_control_plane_template(metadata),
        openstack_machine_template(metadata),
        kubeadm_config_template(metadata),
    ]
}
