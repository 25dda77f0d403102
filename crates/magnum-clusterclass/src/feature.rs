//! The [`ClusterFeature`] trait and the [`FeatureRegistry`] features are registered with.
use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{patches::PatchDefinition, variables::VariableSchema};

/// An independently authored unit contributing variables and patches to a ClusterClass.
///
/// Features are unaware of each other. They must declare variable names which are unique across
/// all registered features and should target paths no other feature touches.
pub trait ClusterFeature: Send + Sync {
    /// A human readable name, used in logs and error messages.
    fn name(&self) -> &'static str;

    fn variables(&self) -> Vec<VariableSchema>;

    fn patches(&self) -> Vec<PatchDefinition>;
}

/// An ordered collection of [`ClusterFeature`]s.
///
/// The registry is populated once during startup and only read afterwards. It doesn't
/// de-duplicate: registering the same feature twice yields two entries, which the
/// [builder](crate::builder::ClusterClassBuilder) rejects because of the repeated variable names.
#[derive(Clone, Default)]
pub struct FeatureRegistry {
    features: Vec<Arc<dyn ClusterFeature>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `feature` to the end of the registry.
    pub fn register<F>(&mut self, feature: F) -> &mut Self
    where
        F: ClusterFeature + 'static,
    {
        self.register_shared(Arc::new(feature))
    }

    /// Appends an already shared `feature` to the end of the registry.
    pub fn register_shared(&mut self, feature: Arc<dyn ClusterFeature>) -> &mut Self {
        debug!(
            feature = feature.name(),
            position = self.features.len(),
            "registering feature"
        );
        self.features.push(feature);
        self
    }

    /// All registered features in registration order.
    pub fn all(&self) -> &[Arc<dyn ClusterFeature>] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.features.iter().map(|feature| feature.name()))
            .finish()
    }
}
