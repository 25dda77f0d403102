//! Composes Cluster API `ClusterClass` documents for OpenStack out of independently authored
//! [features](feature::ClusterFeature).
//!
//! Each feature contributes typed, schema-validated input variables and JSON patches which are
//! scoped to a [role](patches::TargetRole) within the cluster topology. The
//! [`ClusterClassBuilder`](builder::ClusterClassBuilder) combines a fixed topology skeleton with
//! the contributions of every registered feature, while the [engine](engine) applies the
//! resulting patches to the default [templates] the same way the Cluster API topology controller
//! does.

pub mod builder;
pub mod crd;
pub mod engine;
pub mod feature;
pub mod features;
pub mod gvk;
pub mod patches;
pub mod templates;
pub mod variables;
