//! Cluster Lifecycle Providers
//!
//! Provides the cluster lifecycle adapter for:
//! - kind: local clusters in docker containers

pub mod kind;

pub use kind::*;
