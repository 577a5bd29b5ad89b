//! Error types for the nvkind provisioner
//!
//! Provides structured error types for all provisioner components including
//! the cluster lifecycle provider, GPU node patching, runtime class
//! registration, and kubeconfig handling.

use crate::domain::ports::PatchStep;
use thiserror::Error;

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Cluster Lifecycle Errors
    // =========================================================================
    #[error("Cluster {operation} failed for {cluster}: {reason}")]
    Lifecycle {
        operation: String,
        cluster: String,
        reason: String,
    },

    #[error("Command failed: {command} - {reason}")]
    Command { command: String, reason: String },

    #[error("Operation {operation} timed out after {duration}")]
    Timeout { operation: String, duration: String },

    // =========================================================================
    // GPU Patch Errors
    // =========================================================================
    #[error("GPU detection failed: {0}")]
    GpuDetection(String),

    #[error("Node patch failed: {step} on node {node}: {reason}")]
    NodePatch {
        node: String,
        step: PatchStep,
        reason: String,
    },

    #[error("Runtime class registration failed for cluster {cluster}: {reason}")]
    RuntimeClass { cluster: String, reason: String },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Kubeconfig parse error: {0}")]
    KubeconfigParse(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an operator has to do after a failed lifecycle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-run the same operation
    RetryOperation,
    /// The cluster is running but only partially patched; delete and create again
    DestroyAndRecreate,
    /// Correct the resource configuration first
    FixConfiguration,
    /// Inspect the host and cluster by hand
    ManualIntervention,
}

impl std::fmt::Display for Recovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recovery::RetryOperation => write!(f, "retry the operation"),
            Recovery::DestroyAndRecreate => write!(f, "delete the cluster and create it again"),
            Recovery::FixConfiguration => write!(f, "fix the resource configuration"),
            Recovery::ManualIntervention => write!(f, "manual intervention required"),
        }
    }
}

impl Error {
    /// Determine what the operator should do about this error
    pub fn recovery(&self) -> Recovery {
        match self {
            // Provider hiccups and timeouts
            Error::Lifecycle { .. }
            | Error::Command { .. }
            | Error::Timeout { .. }
            | Error::Kube(_) => Recovery::RetryOperation,

            // Cluster exists with some nodes patched
            Error::NodePatch { .. } | Error::RuntimeClass { .. } => Recovery::DestroyAndRecreate,

            // Bad input
            Error::Configuration(_)
            | Error::JsonParse(_)
            | Error::YamlParse(_)
            | Error::KubeconfigParse(_)
            | Error::Kubeconfig(_)
            | Error::Base64(_) => Recovery::FixConfiguration,

            Error::GpuDetection(_) | Error::Io(_) => Recovery::ManualIntervention,
        }
    }

    /// Check if the failure left a running cluster behind
    pub fn leaves_cluster_running(&self) -> bool {
        matches!(self, Error::NodePatch { .. } | Error::RuntimeClass { .. })
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self.recovery(), Recovery::RetryOperation)
    }

    pub(crate) fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Command {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recovery() {
        let err = Error::NodePatch {
            node: "gpu-worker".into(),
            step: PatchStep::ConfigureContainerRuntime,
            reason: "exit status 1".into(),
        };
        assert_eq!(err.recovery(), Recovery::DestroyAndRecreate);
        assert!(err.leaves_cluster_running());

        let err = Error::Configuration("bad config".into());
        assert_eq!(err.recovery(), Recovery::FixConfiguration);
        assert!(!err.leaves_cluster_running());

        let err = Error::Lifecycle {
            operation: "delete".into(),
            cluster: "dev".into(),
            reason: "docker not running".into(),
        };
        assert_eq!(err.recovery(), Recovery::RetryOperation);
    }

    #[test]
    fn test_error_transient() {
        let transient = Error::Timeout {
            operation: "create".into(),
            duration: "300s".into(),
        };
        assert!(transient.is_transient());

        let config_err = Error::KubeconfigParse("no contexts".into());
        assert!(!config_err.is_transient());
    }

    #[test]
    fn test_node_patch_message_names_step() {
        let err = Error::NodePatch {
            node: "dev-worker".into(),
            step: PatchStep::PatchDriverVisibility,
            reason: "mount failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Node patch failed: patch /proc/driver/nvidia on node dev-worker: mount failed"
        );
    }
}
