//! The features bundled with the ClusterClass, in registration order.
//!
//! Every feature lives in its own module and exposes a unit `Feature` struct implementing
//! [`ClusterFeature`](crate::feature::ClusterFeature), plus a `Values` struct describing the
//! topology variables it accepts.
use crate::feature::FeatureRegistry;

pub mod api_server_load_balancer;
pub mod cluster_identity;
pub mod control_plane_availability_zones;
pub mod disable_api_server_floating_ip;
pub mod external_network;
pub mod flavors;
pub mod images;
pub mod ssh_key;

#[cfg(test)]
pub(crate) mod harness;

/// Registers all bundled features with `registry`. The order is part of the generated document,
/// patches of later features are applied after the ones of earlier features.
pub fn register_all(registry: &mut FeatureRegistry) {
    registry
        .register(api_server_load_balancer::Feature)
        .register(cluster_identity::Feature)
        .register(control_plane_availability_zones::Feature)
        .register(disable_api_server_floating_ip::Feature)
        .register(external_network::Feature)
        .register(flavors::Feature)
        .register(images::Feature)
        .register(ssh_key::Feature);
}

/// Creates a registry containing all bundled features.
pub fn default_registry() -> FeatureRegistry {
    let mut registry = FeatureRegistry::new();
    register_all(&mut registry);

    registry
}
