//! Domain Ports - Core trait definitions for the provisioner
//!
//! These traits define the boundaries between the provisioning logic and
//! external systems (the kind provider, the host GPU stack, the node
//! containers, the cluster API). Adapters implement these traits to provide
//! concrete functionality.

use crate::error::Result;
use crate::gpu::{ClusterPatchContext, GpuInventory, NodePatchContext};
use crate::kindconfig::Cluster;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Node Handles
// =============================================================================

/// Provider-issued reference to a running cluster node container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(String);

impl NodeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Container name of the node
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Create Options
// =============================================================================

/// Options passed to the lifecycle provider when creating a cluster
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Kubeconfig file the provider writes the new context into
    pub kubeconfig_path: Option<PathBuf>,
    /// Node image for every node without its own image
    pub node_image: Option<String>,
    /// Cluster specification
    pub config: Option<Cluster>,
    /// Wait this long for the control plane to report ready
    pub wait_for_ready: Option<Duration>,
}

impl CreateOptions {
    pub fn with_kubeconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig_path = Some(path.into());
        self
    }

    pub fn with_node_image(mut self, image: impl Into<String>) -> Self {
        self.node_image = Some(image.into());
        self
    }

    pub fn with_config(mut self, config: Cluster) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_wait_for_ready(mut self, timeout: Duration) -> Self {
        self.wait_for_ready = Some(timeout);
        self
    }
}

// =============================================================================
// Patch Steps
// =============================================================================

/// Node-level GPU patch steps, in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatchStep {
    InstallContainerToolkit,
    ConfigureContainerRuntime,
    PatchDriverVisibility,
}

impl PatchStep {
    /// Every node step in application order
    pub const ORDERED: [PatchStep; 3] = [
        PatchStep::InstallContainerToolkit,
        PatchStep::ConfigureContainerRuntime,
        PatchStep::PatchDriverVisibility,
    ];
}

impl std::fmt::Display for PatchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchStep::InstallContainerToolkit => write!(f, "install container toolkit"),
            PatchStep::ConfigureContainerRuntime => write!(f, "configure container runtime"),
            PatchStep::PatchDriverVisibility => write!(f, "patch /proc/driver/nvidia"),
        }
    }
}

// =============================================================================
// Cluster Lifecycle Port
// =============================================================================

/// Port for the cluster-lifecycle provider
#[async_trait]
pub trait ClusterLifecycle: Send + Sync {
    /// Create a cluster
    async fn create(&self, name: &str, options: CreateOptions) -> Result<()>;

    /// List the running nodes of a cluster
    async fn list_nodes(&self, name: &str) -> Result<Vec<NodeHandle>>;

    /// Get kubeconfig contents for a cluster
    async fn kubeconfig(&self, name: &str, internal: bool) -> Result<String>;

    /// Write the cluster's kubeconfig to a file
    async fn export_kubeconfig(&self, name: &str, path: &str, internal: bool) -> Result<()>;

    /// Delete a cluster and remove its context from the kubeconfig file
    async fn delete(&self, name: &str, kubeconfig_path: &str) -> Result<()>;
}

// =============================================================================
// GPU Ports
// =============================================================================

/// Port for host GPU detection
#[async_trait]
pub trait GpuDetector: Send + Sync {
    /// Enumerate the host GPUs
    async fn detect(&self) -> Result<GpuInventory>;
}

/// Port for node-level GPU patch mechanics
#[async_trait]
pub trait GpuNodePatcher: Send + Sync {
    /// Whether the node should receive GPU patches
    async fn has_gpus(&self, node: &NodePatchContext<'_>) -> bool;

    /// Install the NVIDIA container toolkit inside the node
    async fn install_container_toolkit(&self, node: &NodePatchContext<'_>) -> Result<()>;

    /// Configure containerd inside the node to use the NVIDIA runtime
    async fn configure_container_runtime(&self, node: &NodePatchContext<'_>) -> Result<()>;

    /// Patch /proc/driver/nvidia so device files are not modified in-container
    async fn patch_proc_driver_nvidia(&self, node: &NodePatchContext<'_>) -> Result<()>;

    /// Run a single step
    async fn apply(&self, step: PatchStep, node: &NodePatchContext<'_>) -> Result<()> {
        match step {
            PatchStep::InstallContainerToolkit => self.install_container_toolkit(node).await,
            PatchStep::ConfigureContainerRuntime => self.configure_container_runtime(node).await,
            PatchStep::PatchDriverVisibility => self.patch_proc_driver_nvidia(node).await,
        }
    }
}

/// Port for cluster-wide runtime class registration
#[async_trait]
pub trait RuntimeClassRegistrar: Send + Sync {
    /// Register the NVIDIA runtime class in the cluster
    async fn register_runtime_class(&self, cluster: &ClusterPatchContext<'_>) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterLifecycleRef = Arc<dyn ClusterLifecycle>;
pub type GpuDetectorRef = Arc<dyn GpuDetector>;
pub type GpuNodePatcherRef = Arc<dyn GpuNodePatcher>;
pub type RuntimeClassRegistrarRef = Arc<dyn RuntimeClassRegistrar>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_step_order() {
        assert_eq!(
            PatchStep::ORDERED,
            [
                PatchStep::InstallContainerToolkit,
                PatchStep::ConfigureContainerRuntime,
                PatchStep::PatchDriverVisibility,
            ]
        );
    }

    #[test]
    fn test_create_options_builder() {
        let opts = CreateOptions::default()
            .with_kubeconfig_path("/home/dev/.kube/config")
            .with_node_image("kindest/node:v1.29.7")
            .with_wait_for_ready(Duration::from_secs(300));

        assert_eq!(
            opts.kubeconfig_path,
            Some(PathBuf::from("/home/dev/.kube/config"))
        );
        assert_eq!(opts.node_image.as_deref(), Some("kindest/node:v1.29.7"));
        assert!(opts.config.is_none());
        assert_eq!(opts.wait_for_ready, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_node_handle_display() {
        let node = NodeHandle::new("dev-control-plane");
        assert_eq!(node.to_string(), "dev-control-plane");
        assert_eq!(node.name(), "dev-control-plane");
    }
}
