//! nvkind Provisioner - GPU-enabled kind clusters
//!
//! Provisions local Kubernetes clusters with kind and makes the nodes that
//! request GPUs able to run NVIDIA workloads.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                    Resource Lifecycle Orchestrator                          │
//! │                    (create / read / delete)                                 │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │  Config         │  │  Shared Patch   │  │  Kubeconfig                 │  │
//! │  │  Translator     │  │  State          │  │  Credentials                │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                               Ports                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Cluster     │  │  GPU         │  │  GPU Node    │  │  RuntimeClass   │  │
//! │  │  Lifecycle   │  │  Detector    │  │  Patcher     │  │  Registrar      │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └───────┬─────────┘  │
//! ├─────────┼─────────────────┼─────────────────┼──────────────────┼────────────┤
//! │      kind CLI         nvidia-smi       docker exec       Kubernetes API     │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`resource`]: Resource state and the lifecycle orchestrator
//! - [`kindconfig`]: kind cluster specification and its translator
//! - [`gpu`]: GPU detection, node patching and runtime class registration
//! - [`provider`]: Cluster lifecycle providers
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod domain;
pub mod error;
pub mod gpu;
pub mod kindconfig;
pub mod provider;
pub mod resource;

// Re-export commonly used types
pub use resource::{
    AdapterConfig, ClusterCredentials, Collaborators, CreateProgress, NodePatchRecord,
    Orchestrator, OrchestratorConfig, ResourceConfig, ResourceState,
    DEFAULT_CREATE_TIMEOUT, DEFAULT_DELETE_TIMEOUT, DEFAULT_UPDATE_TIMEOUT,
};

pub use kindconfig::{
    translate, translate_value, Cluster, ClusterIpFamily, ConfigTree, Mount, MountPropagation,
    Networking, Node, NodeRole, PortMapping, PortMappingProtocol, ProxyMode,
};

pub use domain::ports::{
    ClusterLifecycle, CreateOptions, GpuDetector, GpuNodePatcher, NodeHandle, PatchStep,
    RuntimeClassRegistrar,
};

pub use error::{Error, Recovery, Result};

pub use gpu::{
    ClusterPatchContext, DockerNodePatcher, DockerPatcherConfig, GpuDevice, GpuInventory,
    KubeRuntimeClassRegistrar, NodePatchContext, NvidiaSmiConfig, NvidiaSmiDetector,
    OutputSinks, RuntimeClassConfig, SharedPatchState,
};

pub use provider::{KindCli, KindCliConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
