//! Host GPU Inventory
//!
//! Enumerates the NVIDIA GPUs visible on the host with `nvidia-smi`. The
//! inventory is detected at most once per provisioning run, and only when
//! a node mounts GPU devices. Every node patch context shares it.

use crate::domain::ports::GpuDetector;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

// =============================================================================
// Inventory
// =============================================================================

/// A GPU visible on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub index: u32,
    pub uuid: String,
    pub name: String,
}

/// GPUs visible on the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInventory {
    devices: Vec<GpuDevice>,
}

impl GpuInventory {
    pub fn new(devices: Vec<GpuDevice>) -> Self {
        Self { devices }
    }

    /// Inventory of a host without GPUs
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[GpuDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Whether a device selector (index or UUID) names a host GPU
    pub fn contains(&self, selector: &str) -> bool {
        match selector.parse::<u32>() {
            Ok(index) => self.devices.iter().any(|d| d.index == index),
            Err(_) => self.devices.iter().any(|d| d.uuid == selector),
        }
    }

    /// Parse `nvidia-smi --query-gpu=index,uuid,name --format=csv,noheader`
    pub fn parse_nvidia_smi(output: &str) -> Result<Self> {
        let mut devices = Vec::new();

        for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut fields = line.splitn(3, ',').map(str::trim);
            let (Some(index), Some(uuid), Some(name)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::GpuDetection(format!("Unexpected nvidia-smi line: {}", line)));
            };

            let index = index.parse().map_err(|_| {
                Error::GpuDetection(format!("Invalid GPU index: {}", index))
            })?;

            devices.push(GpuDevice {
                index,
                uuid: uuid.to_string(),
                name: name.to_string(),
            });
        }

        Ok(Self { devices })
    }
}

// =============================================================================
// nvidia-smi Detector
// =============================================================================

/// Configuration for the nvidia-smi detector
#[derive(Debug, Clone)]
pub struct NvidiaSmiConfig {
    /// nvidia-smi executable
    pub binary: PathBuf,
}

impl Default for NvidiaSmiConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("nvidia-smi"),
        }
    }
}

/// Detects host GPUs by running nvidia-smi
pub struct NvidiaSmiDetector {
    config: NvidiaSmiConfig,
}

impl NvidiaSmiDetector {
    pub fn new(config: NvidiaSmiConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl GpuDetector for NvidiaSmiDetector {
    async fn detect(&self) -> Result<GpuInventory> {
        let output = match Command::new(&self.config.binary)
            .args(["--query-gpu=index,uuid,name", "--format=csv,noheader"])
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "{} not found, treating host as having no GPUs",
                    self.config.binary.display()
                );
                return Ok(GpuInventory::empty());
            }
            Err(e) => return Err(Error::command("nvidia-smi", e.to_string())),
        };

        if !output.status.success() {
            return Err(Error::GpuDetection(failure_reason(&output)));
        }

        let inventory = GpuInventory::parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))?;
        for device in inventory.devices() {
            debug!(index = device.index, uuid = %device.uuid, "Found GPU {}", device.name);
        }
        info!("Detected {} host GPUs", inventory.len());

        Ok(inventory)
    }
}

/// nvidia-smi reports most failures on stdout
fn failure_reason(output: &Output) -> String {
    [&output.stderr, &output.stdout]
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| output.status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SMI_OUTPUT: &str = "\
0, GPU-4b0b8a0c-8d3f-5d1e-9b8f-0f3c1a2b3c4d, NVIDIA A100-SXM4-80GB
1, GPU-7e1d2c3b-4a5f-6e7d-8c9b-0a1b2c3d4e5f, NVIDIA A100-SXM4-80GB
";

    #[test]
    fn test_parse_nvidia_smi() {
        let inventory = GpuInventory::parse_nvidia_smi(SMI_OUTPUT).unwrap();

        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.devices()[1].index, 1);
        assert_eq!(inventory.devices()[0].name, "NVIDIA A100-SXM4-80GB");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(GpuInventory::parse_nvidia_smi("No devices were found").is_err());
        assert!(GpuInventory::parse_nvidia_smi("x, GPU-1, Tesla T4").is_err());
        assert!(GpuInventory::parse_nvidia_smi("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_contains_by_index_or_uuid() {
        let inventory = GpuInventory::parse_nvidia_smi(SMI_OUTPUT).unwrap();

        assert!(inventory.contains("0"));
        assert!(inventory.contains("1"));
        assert!(!inventory.contains("2"));
        assert!(inventory.contains("GPU-7e1d2c3b-4a5f-6e7d-8c9b-0a1b2c3d4e5f"));
        assert!(!inventory.contains("GPU-missing"));
    }

    #[tokio::test]
    async fn test_missing_binary_means_no_gpus() {
        let detector = NvidiaSmiDetector::new(NvidiaSmiConfig {
            binary: PathBuf::from("/nonexistent/nvidia-smi"),
        });

        let inventory = detector.detect().await.unwrap();
        assert!(inventory.is_empty());
    }

    #[cfg(unix)]
    fn failed(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_reason_prefers_stderr_then_stdout() {
        let driver_down = "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver.";

        assert_eq!(failure_reason(&failed(9, driver_down, "  \n")), driver_down);
        assert_eq!(failure_reason(&failed(9, driver_down, "permission denied\n")), "permission denied");
        assert!(failure_reason(&failed(9, "", "")).contains('9'));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_failure_still_explained() {
        let detector = NvidiaSmiDetector::new(NvidiaSmiConfig {
            binary: PathBuf::from("false"),
        });

        let err = detector.detect().await.unwrap_err();
        assert_matches!(err, Error::GpuDetection(ref reason) if !reason.is_empty());
    }
}
