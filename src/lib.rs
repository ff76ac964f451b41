//! UnifiedPush Binding Controller Library
//!
//! Reconciles mobile client binding requests, stored as Kubernetes secrets,
//! with Android variants in a UnifiedPush server, and mirrors every variant
//! into a ConfigMap. Tests are included in the module files.

pub mod binding;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod mirror;
pub mod observability;
pub mod registry;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;
