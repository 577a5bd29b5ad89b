//! Patch Contexts
//!
//! Values handed to the node patcher and runtime class registrar. Every
//! context of one provisioning run points at the same [`SharedPatchState`],
//! so host GPU detection happens at most once and all command output lands
//! in one set of sinks.

use super::inventory::GpuInventory;
use super::sinks::OutputSinks;
use crate::domain::ports::NodeHandle;
use crate::kindconfig::Node;
use std::path::Path;
use std::sync::Arc;

/// State shared by every patch operation of a provisioning run
#[derive(Debug)]
pub struct SharedPatchState {
    gpus: GpuInventory,
    output: OutputSinks,
}

impl SharedPatchState {
    pub fn new(gpus: GpuInventory, output: OutputSinks) -> Arc<Self> {
        Arc::new(Self { gpus, output })
    }

    pub fn gpus(&self) -> &GpuInventory {
        &self.gpus
    }

    pub fn output(&self) -> &OutputSinks {
        &self.output
    }
}

// =============================================================================
// Node Context
// =============================================================================

/// Everything a node patch step needs to know about one live node
#[derive(Debug, Clone)]
pub struct NodePatchContext<'a> {
    node: &'a NodeHandle,
    spec: Option<&'a Node>,
    shared: Arc<SharedPatchState>,
}

impl<'a> NodePatchContext<'a> {
    pub fn new(
        node: &'a NodeHandle,
        spec: Option<&'a Node>,
        shared: &Arc<SharedPatchState>,
    ) -> Self {
        Self {
            node,
            spec,
            shared: Arc::clone(shared),
        }
    }

    pub fn node(&self) -> &NodeHandle {
        self.node
    }

    /// Node spec declared at the same position, if any
    pub fn spec(&self) -> Option<&Node> {
        self.spec
    }

    pub fn gpus(&self) -> &GpuInventory {
        self.shared.gpus()
    }

    pub fn output(&self) -> &OutputSinks {
        self.shared.output()
    }

    pub fn shared(&self) -> &Arc<SharedPatchState> {
        &self.shared
    }
}

// =============================================================================
// Cluster Context
// =============================================================================

/// Everything a cluster-wide patch needs
#[derive(Debug, Clone)]
pub struct ClusterPatchContext<'a> {
    name: &'a str,
    kubeconfig_path: Option<&'a Path>,
    shared: Arc<SharedPatchState>,
}

impl<'a> ClusterPatchContext<'a> {
    pub fn new(
        name: &'a str,
        kubeconfig_path: Option<&'a Path>,
        shared: &Arc<SharedPatchState>,
    ) -> Self {
        Self {
            name,
            kubeconfig_path,
            shared: Arc::clone(shared),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Kubeconfig file the cluster context was written to at create time
    pub fn kubeconfig_path(&self) -> Option<&Path> {
        self.kubeconfig_path
    }

    pub fn output(&self) -> &OutputSinks {
        self.shared.output()
    }

    pub fn shared(&self) -> &Arc<SharedPatchState> {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_share_state() {
        let shared = SharedPatchState::new(GpuInventory::empty(), OutputSinks::new());
        let first = NodeHandle::new("dev-control-plane");
        let second = NodeHandle::new("dev-worker");
        let spec = Node::default();

        let a = NodePatchContext::new(&first, Some(&spec), &shared);
        let b = NodePatchContext::new(&second, None, &shared);
        let cluster = ClusterPatchContext::new("dev", None, &shared);

        assert!(Arc::ptr_eq(a.shared(), b.shared()));
        assert!(Arc::ptr_eq(a.shared(), cluster.shared()));
        assert!(a.output().same_sink(cluster.output()));
        assert_eq!(a.node().name(), "dev-control-plane");
        assert!(a.spec().is_some());
        assert!(b.spec().is_none());
        assert_eq!(Arc::strong_count(&shared), 4);
    }
}
