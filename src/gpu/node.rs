//! Docker Node Patcher
//!
//! Applies the NVIDIA runtime patches inside kind node containers with
//! `docker exec`. A node is eligible when its spec mounts a device selector
//! under `/var/run/nvidia-container-devices/` that matches a host GPU.

use super::context::NodePatchContext;
use super::inventory::GpuInventory;
use crate::domain::ports::{GpuNodePatcher, PatchStep};
use crate::error::{Error, Result};
use crate::kindconfig::Node;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, error, info};

// =============================================================================
// Constants
// =============================================================================

/// Container path prefix that requests GPUs for a node
pub const NVIDIA_DEVICES_MOUNT_PREFIX: &str = "/var/run/nvidia-container-devices/";

/// Selector requesting every host GPU
const ALL_DEVICES: &str = "all";

const INSTALL_CONTAINER_TOOLKIT_SCRIPT: &str = r#"set -e
apt-get update
apt-get install -y gpg
curl -fsSL https://nvidia.github.io/libnvidia-container/gpgkey \
  | gpg --dearmor --batch --yes -o /usr/share/keyrings/nvidia-container-toolkit-keyring.gpg
curl -s -L https://nvidia.github.io/libnvidia-container/stable/deb/nvidia-container-toolkit.list \
  | sed 's#deb https://#deb [signed-by=/usr/share/keyrings/nvidia-container-toolkit-keyring.gpg] https://#g' \
  | tee /etc/apt/sources.list.d/nvidia-container-toolkit.list
apt-get update
apt-get install -y nvidia-container-toolkit
"#;

const CONFIGURE_CONTAINER_RUNTIME_SCRIPT: &str = r#"set -e
nvidia-ctk runtime configure --runtime=containerd --config-source=command
nvidia-ctk config --set accept-nvidia-visible-devices-as-volume-mounts=true --in-place
systemctl restart containerd
"#;

const PATCH_PROC_DRIVER_NVIDIA_SCRIPT: &str = r#"set -e
umount -R /proc/driver/nvidia || true
cp /proc/driver/nvidia/params /root/gpu-params
sed -i 's/^ModifyDeviceFiles: 1$/ModifyDeviceFiles: 0/' /root/gpu-params
mount --bind /root/gpu-params /proc/driver/nvidia/params
"#;

// =============================================================================
// Eligibility
// =============================================================================

/// Device selectors a node spec mounts under the NVIDIA devices prefix
fn device_selectors(spec: &Node) -> impl Iterator<Item = &str> {
    spec.extra_mounts
        .iter()
        .filter_map(|m| m.container_path.strip_prefix(NVIDIA_DEVICES_MOUNT_PREFIX))
}

/// Whether a node spec mounts any NVIDIA device selector at all
pub fn mounts_gpu_devices(spec: &Node) -> bool {
    device_selectors(spec).next().is_some()
}

/// Whether a node spec requests GPUs that the host actually has
pub fn requests_gpus(spec: &Node, gpus: &GpuInventory) -> bool {
    device_selectors(spec).any(|selector| match selector {
        ALL_DEVICES => !gpus.is_empty(),
        selector => gpus.contains(selector),
    })
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the docker node patcher
#[derive(Debug, Clone)]
pub struct DockerPatcherConfig {
    /// docker executable
    pub binary: PathBuf,
    /// Shell used inside the node container
    pub shell: String,
}

impl Default for DockerPatcherConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
            shell: "bash".to_string(),
        }
    }
}

// =============================================================================
// Docker Node Patcher
// =============================================================================

/// Patches kind node containers through the docker CLI
pub struct DockerNodePatcher {
    config: DockerPatcherConfig,
}

impl DockerNodePatcher {
    pub fn new(config: DockerPatcherConfig) -> Self {
        Self { config }
    }

    /// Run a script inside the node, streaming output into the shared sinks
    async fn exec(&self, node: &NodePatchContext<'_>, step: PatchStep, script: &str) -> Result<()> {
        let name = node.node().name();
        info!(node = %name, "Running step: {}", step);

        let output = Command::new(&self.config.binary)
            .args(["exec", name, self.config.shell.as_str(), "-c", script])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::NodePatch {
                node: name.to_string(),
                step,
                reason: e.to_string(),
            })?;

        let sinks = node.output();
        sinks.stdout(name, &String::from_utf8_lossy(&output.stdout));
        sinks.stderr(name, &String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let reason = match sinks.last_error(name) {
                Some(line) => format!("{}: {}", output.status, line),
                None => output.status.to_string(),
            };
            error!(node = %name, step = %step, "{}", reason);
            return Err(Error::NodePatch {
                node: name.to_string(),
                step,
                reason,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl GpuNodePatcher for DockerNodePatcher {
    async fn has_gpus(&self, node: &NodePatchContext<'_>) -> bool {
        let eligible = node
            .spec()
            .map(|spec| requests_gpus(spec, node.gpus()))
            .unwrap_or(false);

        debug!(
            node = %node.node(),
            has_spec = node.spec().is_some(),
            host_gpus = node.gpus().len(),
            "GPU eligibility: {}",
            eligible
        );

        eligible
    }

    async fn install_container_toolkit(&self, node: &NodePatchContext<'_>) -> Result<()> {
        self.exec(node, PatchStep::InstallContainerToolkit, INSTALL_CONTAINER_TOOLKIT_SCRIPT)
            .await
    }

    async fn configure_container_runtime(&self, node: &NodePatchContext<'_>) -> Result<()> {
        self.exec(node, PatchStep::ConfigureContainerRuntime, CONFIGURE_CONTAINER_RUNTIME_SCRIPT)
            .await
    }

    async fn patch_proc_driver_nvidia(&self, node: &NodePatchContext<'_>) -> Result<()> {
        self.exec(node, PatchStep::PatchDriverVisibility, PATCH_PROC_DRIVER_NVIDIA_SCRIPT)
            .await
    }
}
