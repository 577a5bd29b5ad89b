//! Cluster Resource
//!
//! Declarative configuration, persisted state, credential extraction and the
//! lifecycle orchestrator that ties the adapters together.

pub mod kubeconfig;
pub mod orchestrator;
pub mod state;

pub use kubeconfig::*;
pub use orchestrator::*;
pub use state::*;
