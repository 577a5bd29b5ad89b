//! kind CLI Lifecycle Provider
//!
//! Drives cluster creation, node listing, kubeconfig retrieval and deletion
//! through the `kind` command line tool.

use crate::domain::ports::{ClusterLifecycle, CreateOptions, NodeHandle};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the kind CLI provider
#[derive(Debug, Clone)]
pub struct KindCliConfig {
    /// kind executable
    pub binary: PathBuf,
}

impl Default for KindCliConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kind"),
        }
    }
}

// =============================================================================
// kind CLI
// =============================================================================

/// Cluster lifecycle provider backed by the kind CLI
pub struct KindCli {
    config: KindCliConfig,
}

impl KindCli {
    pub fn new(config: KindCliConfig) -> Self {
        Self { config }
    }

    /// Arguments for `kind create cluster`; the config, if any, goes to stdin
    pub fn create_args(name: &str, options: &CreateOptions) -> Vec<String> {
        let mut args: Vec<String> = vec!["create".into(), "cluster".into(), "--name".into(), name.into()];

        if let Some(path) = &options.kubeconfig_path {
            args.push("--kubeconfig".into());
            args.push(path.display().to_string());
        }
        if let Some(image) = &options.node_image {
            args.push("--image".into());
            args.push(image.clone());
        }
        if let Some(timeout) = options.wait_for_ready {
            args.push("--wait".into());
            args.push(format!("{}s", timeout.as_secs()));
        }
        if options.config.is_some() {
            args.push("--config".into());
            args.push("-".into());
        }

        args
    }

    async fn run(&self, operation: &str, cluster: &str, args: &[String], stdin: Option<&str>) -> Result<Output> {
        debug!("Running {} {}", self.config.binary.display(), args.join(" "));

        let mut child = Command::new(&self.config.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::command(self.config.binary.display().to_string(), e.to_string()))?;

        // kind may exit before reading its config; its stderr explains why
        let written = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input.as_bytes()).await,
            _ => Ok(()),
        };

        let output = child.wait_with_output().await?;
        let failure = |reason: String| Error::Lifecycle {
            operation: operation.to_string(),
            cluster: cluster.to_string(),
            reason,
        };
        if !output.status.success() {
            return Err(failure(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        if let Err(e) = written {
            return Err(failure(format!("writing config to stdin: {}", e)));
        }

        Ok(output)
    }
}

fn internal_flag(args: &mut Vec<String>, internal: bool) {
    if internal {
        args.push("--internal".into());
    }
}

#[async_trait]
impl ClusterLifecycle for KindCli {
    async fn create(&self, name: &str, options: CreateOptions) -> Result<()> {
        info!("Creating kind cluster: {}", name);

        let args = Self::create_args(name, &options);
        let config = match options.config {
            Some(cluster) => Some(cluster.with_type_defaults().to_yaml()?),
            None => None,
        };

        self.run("create", name, &args, config.as_deref()).await?;
        Ok(())
    }

    async fn list_nodes(&self, name: &str) -> Result<Vec<NodeHandle>> {
        let args: Vec<String> = vec!["get".into(), "nodes".into(), "--name".into(), name.into()];
        let output = self.run("list nodes", name, &args, None).await?;

        Ok(parse_node_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn kubeconfig(&self, name: &str, internal: bool) -> Result<String> {
        let mut args: Vec<String> = vec!["get".into(), "kubeconfig".into(), "--name".into(), name.into()];
        internal_flag(&mut args, internal);

        let output = self.run("get kubeconfig", name, &args, None).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn export_kubeconfig(&self, name: &str, path: &str, internal: bool) -> Result<()> {
        let mut args: Vec<String> = vec![
            "export".into(),
            "kubeconfig".into(),
            "--name".into(),
            name.into(),
            "--kubeconfig".into(),
            path.into(),
        ];
        internal_flag(&mut args, internal);

        self.run("export kubeconfig", name, &args, None).await?;
        Ok(())
    }

    async fn delete(&self, name: &str, kubeconfig_path: &str) -> Result<()> {
        info!("Deleting kind cluster: {}", name);

        let mut args: Vec<String> = vec!["delete".into(), "cluster".into(), "--name".into(), name.into()];
        if !kubeconfig_path.is_empty() {
            args.push("--kubeconfig".into());
            args.push(kubeconfig_path.into());
        }

        self.run("delete", name, &args, None).await?;
        Ok(())
    }
}

/// `kind get nodes` prints one container name per line
fn parse_node_list(stdout: &str) -> Vec<NodeHandle> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("No kind nodes found"))
        .map(NodeHandle::new)
        .collect()
}
