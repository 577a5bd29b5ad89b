//! Resource Configuration and State
//!
//! `ResourceConfig` is the declarative input for one cluster resource;
//! `ResourceState` is what gets persisted between lifecycle calls. An empty
//! `id` means the resource does not exist.

use crate::domain::ports::PatchStep;
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// =============================================================================
// Declarative Input
// =============================================================================

/// User-supplied resource configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceConfig {
    /// Name given to the created kind cluster
    pub name: String,

    /// Node image kind will use (e.g. kindest/node:v1.29.7)
    #[serde(default)]
    pub node_image: String,

    /// Wait for the control plane to be ready
    #[serde(default)]
    pub wait_for_ready: bool,

    /// kind configuration used to bootstrap the cluster
    #[serde(default)]
    pub kind_config: Option<serde_json::Value>,

    /// Kubeconfig path overriding the defaults
    #[serde(default)]
    pub kubeconfig_path: Option<String>,
}

impl ResourceConfig {
    /// Load a YAML resource configuration
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

// =============================================================================
// Create Progress
// =============================================================================

/// Patch outcome of one live node during the last create
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodePatchRecord {
    pub node: String,
    pub gpu_eligible: bool,
    pub completed_steps: Vec<PatchStep>,
}

impl NodePatchRecord {
    /// Whether every node step ran
    pub fn patched(&self) -> bool {
        self.completed_steps.len() == PatchStep::ORDERED.len()
    }
}

/// Step-level status of the last create, kept for diagnosis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreateProgress {
    pub cluster_created: bool,
    pub nodes: Vec<NodePatchRecord>,
    pub runtime_class_registered: bool,
}

impl CreateProgress {
    pub(crate) fn node_seen(&mut self, node: &str, gpu_eligible: bool) {
        self.nodes.push(NodePatchRecord {
            node: node.to_string(),
            gpu_eligible,
            completed_steps: Vec::new(),
        });
    }

    pub(crate) fn step_done(&mut self, node: &str, step: PatchStep) {
        if let Some(record) = self.nodes.iter_mut().rev().find(|r| r.node == node) {
            record.completed_steps.push(step);
        }
    }

    /// Nodes that received every patch step
    pub fn patched_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|r| r.patched())
            .map(|r| r.node.as_str())
            .collect()
    }
}

// =============================================================================
// Persisted State
// =============================================================================

/// Persisted state of a cluster resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceState {
    /// Resource identity; empty when the resource does not exist
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub node_image: String,

    #[serde(default)]
    pub wait_for_ready: bool,

    #[serde(default)]
    pub kind_config: Option<serde_json::Value>,

    /// Kubeconfig path set after the cluster is created or by the user
    #[serde(default)]
    pub kubeconfig_path: Option<String>,

    /// Kubeconfig contents set after the cluster is created
    #[serde(default)]
    pub kubeconfig: String,

    /// Client certificate for authenticating to the cluster
    #[serde(default)]
    pub client_certificate: String,

    /// Client key for authenticating to the cluster
    #[serde(default)]
    pub client_key: String,

    /// CA certificate the client verifies the API server with
    #[serde(default)]
    pub cluster_ca_certificate: String,

    /// Kubernetes API server endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Cluster successfully created
    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub progress: CreateProgress,
}

impl ResourceState {
    /// Fresh, not yet created state from a configuration
    pub fn from_config(config: ResourceConfig) -> Self {
        Self {
            name: config.name,
            node_image: config.node_image,
            wait_for_ready: config.wait_for_ready,
            kind_config: config.kind_config,
            kubeconfig_path: config.kubeconfig_path.filter(|p| !p.is_empty()),
            ..Default::default()
        }
    }

    /// Identity string for a name and node image
    pub fn identity(name: &str, node_image: &str) -> String {
        format!("{}-{}", name, node_image)
    }

    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }

    pub(crate) fn set_id(&mut self, id: String) {
        debug!("Resource identity set: {}", id);
        self.id = id;
    }

    /// Mark the resource as absent
    pub(crate) fn clear_id(&mut self) {
        debug!("Resource identity cleared for {}", self.name);
        self.id.clear();
    }

    /// Kubeconfig path explicitly set by the user or a previous read
    pub fn recorded_kubeconfig_path(&self) -> Option<&str> {
        self.kubeconfig_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Load state from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// State recording a live cluster at `path`, if any.
    ///
    /// A missing file or one whose identity was cleared yields `None`.
    pub fn load_existing(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let state = Self::load(path)?;
        if !state.exists() {
            debug!("State in {} has no live cluster", path.display());
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Write state as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}
