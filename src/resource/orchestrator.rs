//! Resource Lifecycle Orchestrator
//!
//! Sequences the full lifecycle of a GPU-enabled kind cluster:
//! - Create: provision the cluster, patch every GPU node, register the
//!   NVIDIA RuntimeClass, then read back credentials
//! - Read: refresh kubeconfig contents and connection credentials
//! - Delete: tear the cluster down
//!
//! Create fails fast. The first failing step aborts the run and nothing is
//! rolled back; a cluster that was created stays recorded in the state.

use super::kubeconfig::extract_credentials;
use super::state::ResourceState;
use crate::domain::ports::{
    ClusterLifecycleRef, CreateOptions, GpuDetectorRef, GpuNodePatcherRef, NodeHandle,
    PatchStep, RuntimeClassRegistrarRef,
};
use crate::error::{Error, Result};
use crate::gpu::{
    mounts_gpu_devices, ClusterPatchContext, DockerNodePatcher, DockerPatcherConfig,
    GpuInventory, KubeRuntimeClassRegistrar, NodePatchContext, NvidiaSmiConfig,
    NvidiaSmiDetector, OutputSinks, RuntimeClassConfig, SharedPatchState,
};
use crate::kindconfig::{translate_value, Cluster};
use crate::provider::{KindCli, KindCliConfig};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// =============================================================================
// Timeouts
// =============================================================================

/// Time allowed for each create phase, and for control plane readiness when waiting
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Time allowed for an update
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Time allowed for a delete
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Bound an operation, mapping expiry to [`Error::Timeout`]
pub async fn with_timeout<F, T>(operation: &str, timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| Error::Timeout {
            operation: operation.to_string(),
            duration: format!("{}s", timeout.as_secs_f64()),
        })?
}

// =============================================================================
// Orchestrator Configuration
// =============================================================================

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound of each create phase, also passed as the readiness wait
    pub create_timeout: Duration,
    /// Home directory for the default `.kube/config` location
    pub home_dir: Option<PathBuf>,
    /// Directory exported kubeconfig files are written to; the process
    /// working directory when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            create_timeout: DEFAULT_CREATE_TIMEOUT,
            home_dir: dirs::home_dir(),
            work_dir: None,
        }
    }
}

/// Configuration for the local adapters
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    pub kind: KindCliConfig,
    pub docker: DockerPatcherConfig,
    pub nvidia_smi: NvidiaSmiConfig,
    pub runtime_class: RuntimeClassConfig,
}

// =============================================================================
// Collaborators
// =============================================================================

/// External systems the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub lifecycle: ClusterLifecycleRef,
    pub detector: GpuDetectorRef,
    pub patcher: GpuNodePatcherRef,
    pub registrar: RuntimeClassRegistrarRef,
}

impl Collaborators {
    /// kind, docker, nvidia-smi and the Kubernetes API on the local host
    pub fn local(config: AdapterConfig) -> Self {
        Self {
            lifecycle: Arc::new(KindCli::new(config.kind)),
            detector: Arc::new(NvidiaSmiDetector::new(config.nvidia_smi)),
            patcher: Arc::new(DockerNodePatcher::new(config.docker)),
            registrar: Arc::new(KubeRuntimeClassRegistrar::new(config.runtime_class)),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives create, read and delete of a cluster resource
pub struct Orchestrator {
    config: OrchestratorConfig,
    lifecycle: ClusterLifecycleRef,
    detector: GpuDetectorRef,
    patcher: GpuNodePatcherRef,
    registrar: RuntimeClassRegistrarRef,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Arc<Self> {
        Arc::new(Self {
            config,
            lifecycle: collaborators.lifecycle,
            detector: collaborators.detector,
            patcher: collaborators.patcher,
            registrar: collaborators.registrar,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Create the cluster and make it GPU-capable.
    ///
    /// Provisioning gets the create timeout on top of any readiness wait
    /// the provider enforces itself. Everything after provisioning shares a
    /// second create timeout; a cluster that outlives it stays recorded.
    pub async fn create(&self, state: &mut ResourceState) -> Result<()> {
        info!("Creating local Kubernetes cluster: {}", state.name);

        let cluster = state.kind_config.as_ref().and_then(translate_value);
        let kubeconfig_path = self.create_kubeconfig_path(state);
        let options = self.create_options(state, kubeconfig_path.as_deref(), cluster.clone());
        let provision_timeout =
            self.config.create_timeout + options.wait_for_ready.unwrap_or_default();

        state.progress = Default::default();
        let provisioned = with_timeout(
            "create",
            provision_timeout,
            self.lifecycle.create(&state.name, options),
        )
        .await;
        if let Err(e) = provisioned {
            error!("Failed to create cluster {}: {}", state.name, e);
            return Err(e);
        }

        state.set_id(ResourceState::identity(&state.name, &state.node_image));
        state.progress.cluster_created = true;
        info!("Cluster {} created", state.name);

        let finished = with_timeout(
            "create",
            self.config.create_timeout,
            self.finish_create(state, kubeconfig_path.as_deref(), cluster.as_ref()),
        )
        .await;
        if let Err(Error::Timeout { .. }) = &finished {
            warn!("Cluster {} is running but was not finished in time", state.name);
        }
        finished
    }

    /// Patch GPU nodes, register the runtime class and read back credentials
    async fn finish_create(
        &self,
        state: &mut ResourceState,
        kubeconfig_path: Option<&Path>,
        cluster: Option<&Cluster>,
    ) -> Result<()> {
        let nodes = self.lifecycle.list_nodes(&state.name).await?;
        debug!("Cluster {} has {} nodes", state.name, nodes.len());

        let wants_gpus = cluster.map_or(false, |c| c.nodes.iter().any(mounts_gpu_devices));
        let gpus = if wants_gpus {
            self.detector.detect().await?
        } else {
            debug!("Cluster {} mounts no GPU devices, skipping host detection", state.name);
            GpuInventory::empty()
        };
        let shared = SharedPatchState::new(gpus, OutputSinks::new());

        self.patch_nodes(state, &nodes, cluster, &shared).await?;

        let ctx = ClusterPatchContext::new(&state.name, kubeconfig_path, &shared);
        self.registrar.register_runtime_class(&ctx).await.map_err(|e| {
            error!("Failed to register runtime class in {}: {}", state.name, e);
            e
        })?;
        state.progress.runtime_class_registered = true;

        self.read(state).await
    }

    /// Kubeconfig the provider writes the new context into
    fn create_kubeconfig_path(&self, state: &ResourceState) -> Option<PathBuf> {
        match state.recorded_kubeconfig_path() {
            Some(path) => Some(PathBuf::from(path)),
            None => self
                .config
                .home_dir
                .as_ref()
                .map(|home| home.join(".kube").join("config")),
        }
    }

    /// Provider options for a create
    pub fn create_options(
        &self,
        state: &ResourceState,
        kubeconfig_path: Option<&Path>,
        cluster: Option<Cluster>,
    ) -> CreateOptions {
        let mut options = CreateOptions::default();

        if let Some(path) = kubeconfig_path {
            options = options.with_kubeconfig_path(path);
        }
        if !state.node_image.is_empty() {
            info!("Using node image: {}", state.node_image);
            options = options.with_node_image(state.node_image.clone());
        }
        if let Some(cluster) = cluster {
            options = options.with_config(cluster);
        }
        if state.wait_for_ready {
            options = options.with_wait_for_ready(self.config.create_timeout);
        }

        options
    }

    /// Patch every GPU-eligible live node, in listing order
    async fn patch_nodes(
        &self,
        state: &mut ResourceState,
        nodes: &[NodeHandle],
        cluster: Option<&Cluster>,
        shared: &Arc<SharedPatchState>,
    ) -> Result<()> {
        let specs = cluster.map(|c| c.nodes.as_slice()).unwrap_or_default();
        if !specs.is_empty() && specs.len() != nodes.len() {
            warn!(
                "Cluster {} declares {} nodes but {} are running; correlating by position",
                state.name,
                specs.len(),
                nodes.len()
            );
        }

        for (index, node) in nodes.iter().enumerate() {
            let ctx = NodePatchContext::new(node, specs.get(index), shared);

            let eligible = self.patcher.has_gpus(&ctx).await;
            state.progress.node_seen(node.name(), eligible);
            if !eligible {
                debug!("Node {} has no GPUs requested, skipping", node);
                continue;
            }

            info!("Patching GPU node {}", node);
            for step in PatchStep::ORDERED {
                self.patcher.apply(step, &ctx).await.map_err(|e| {
                    error!(node = %node, step = %step, "Node patch failed: {}", e);
                    e
                })?;
                state.progress.step_done(node.name(), step);
            }
        }

        Ok(())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Refresh kubeconfig contents and credentials.
    ///
    /// A cluster whose kubeconfig cannot be fetched is treated as gone and
    /// its identity is cleared.
    pub async fn read(&self, state: &mut ResourceState) -> Result<()> {
        debug!("Reading cluster {} ({})", state.name, state.id);

        let kubeconfig = match self.lifecycle.kubeconfig(&state.name, false).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Cluster {} not readable: {}", state.name, e);
                state.clear_id();
                return Err(e);
            }
        };
        state.kubeconfig = kubeconfig;

        if state.recorded_kubeconfig_path().is_none() {
            if let Err(e) = self.export_kubeconfig(state).await {
                state.clear_id();
                return Err(e);
            }
        }

        let credentials = extract_credentials(&state.kubeconfig)?;
        state.client_certificate = credentials.client_certificate;
        state.client_key = credentials.client_key;
        state.cluster_ca_certificate = credentials.cluster_ca_certificate;
        state.endpoint = credentials.endpoint;
        state.completed = true;

        Ok(())
    }

    /// Export the kubeconfig to `<work dir>/<name>-config` and record the path
    async fn export_kubeconfig(&self, state: &mut ResourceState) -> Result<()> {
        let dir = match &self.config.work_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let path = dir
            .join(format!("{}-config", state.name))
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Configuration(format!("Non UTF-8 path: {}", dir.display())))?;

        self.lifecycle
            .export_kubeconfig(&state.name, &path, false)
            .await?;

        info!("Exported kubeconfig for {} to {}", state.name, path);
        state.kubeconfig_path = Some(path);
        Ok(())
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete the cluster; the identity is only cleared on success
    pub async fn delete(&self, state: &mut ResourceState) -> Result<()> {
        info!("Deleting local Kubernetes cluster: {}", state.name);

        let kubeconfig_path = state.recorded_kubeconfig_path().unwrap_or_default();
        self.lifecycle.delete(&state.name, kubeconfig_path).await?;

        state.clear_id();
        Ok(())
    }
}
