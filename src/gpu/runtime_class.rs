//! NVIDIA RuntimeClass Registration
//!
//! Registers the `nvidia` RuntimeClass in a freshly created cluster with a
//! server-side apply, so pods can opt into the NVIDIA container runtime.

use super::context::ClusterPatchContext;
use crate::domain::ports::RuntimeClassRegistrar;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::node::v1::RuntimeClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::info;

/// Configuration for the runtime class registrar
#[derive(Debug, Clone)]
pub struct RuntimeClassConfig {
    /// RuntimeClass object name
    pub name: String,
    /// containerd runtime handler configured by nvidia-ctk
    pub handler: String,
    /// Field manager for server-side apply
    pub field_manager: String,
}

impl Default for RuntimeClassConfig {
    fn default() -> Self {
        Self {
            name: "nvidia".to_string(),
            handler: "nvidia".to_string(),
            field_manager: "nvkind-provisioner".to_string(),
        }
    }
}

/// Registers the runtime class through the Kubernetes API
pub struct KubeRuntimeClassRegistrar {
    config: RuntimeClassConfig,
}

impl KubeRuntimeClassRegistrar {
    pub fn new(config: RuntimeClassConfig) -> Self {
        Self { config }
    }

    /// The RuntimeClass object that gets applied
    pub fn runtime_class(&self) -> RuntimeClass {
        RuntimeClass {
            metadata: ObjectMeta {
                name: Some(self.config.name.clone()),
                ..Default::default()
            },
            handler: self.config.handler.clone(),
            ..Default::default()
        }
    }

    /// kind names the context of a cluster `kind-<name>`
    fn context_name(cluster: &str) -> String {
        format!("kind-{}", cluster)
    }

    async fn client(&self, cluster: &ClusterPatchContext<'_>) -> Result<Client> {
        let kubeconfig = match cluster.kubeconfig_path() {
            Some(path) => Kubeconfig::read_from(path)?,
            None => Kubeconfig::read()?,
        };
        let options = KubeConfigOptions {
            context: Some(Self::context_name(cluster.name())),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;

        Ok(Client::try_from(config)?)
    }
}

#[async_trait]
impl RuntimeClassRegistrar for KubeRuntimeClassRegistrar {
    async fn register_runtime_class(&self, cluster: &ClusterPatchContext<'_>) -> Result<()> {
        info!(
            "Registering RuntimeClass {} in cluster {}",
            self.config.name,
            cluster.name()
        );

        let to_error = |e: Error| Error::RuntimeClass {
            cluster: cluster.name().to_string(),
            reason: e.to_string(),
        };

        let client = self.client(cluster).await.map_err(&to_error)?;
        let api: Api<RuntimeClass> = Api::all(client);
        let params = PatchParams::apply(&self.config.field_manager).force();

        api.patch(&self.config.name, &params, &Patch::Apply(&self.runtime_class()))
            .await
            .map_err(|e| to_error(e.into()))?;

        cluster.output().stdout(
            cluster.name(),
            &format!("runtimeclass.node.k8s.io/{} configured", self.config.name),
        );

        Ok(())
    }
}
