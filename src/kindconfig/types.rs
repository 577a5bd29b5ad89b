//! Cluster Specification types
//!
//! Typed mirror of kind's `kind.x-k8s.io/v1alpha4` `Cluster` configuration.
//! Field names serialise to the camelCase keys kind reads, and unset values
//! are left out of the YAML so kind applies its own defaults.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Constants
// =============================================================================

pub const CLUSTER_KIND: &str = "Cluster";
pub const CLUSTER_API_VERSION: &str = "kind.x-k8s.io/v1alpha4";

fn is_zero(value: &i32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// Cluster
// =============================================================================

/// Typed description of a kind cluster's topology and configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    /// Nodes in declaration order; the provider lists them in the same order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networking: Option<Networking>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containerd_config_patches: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub runtime_config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

impl Cluster {
    /// Fill in the kind/apiVersion tags kind requires when they were left empty
    pub fn with_type_defaults(mut self) -> Self {
        if self.kind.is_empty() {
            self.kind = CLUSTER_KIND.to_string();
        }
        if self.api_version.is_empty() {
            self.api_version = CLUSTER_API_VERSION.to_string();
        }
        self
    }

    /// Render as the YAML document kind reads from `--config`
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// =============================================================================
// Node
// =============================================================================

/// A single node of the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unset means kind's default (control-plane)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<NodeRole>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_mounts: Vec<Mount>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_port_mappings: Vec<PortMapping>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubeadm_config_patches: Vec<String>,
}

/// Node role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    #[serde(rename = "control-plane")]
    ControlPlane,
    #[serde(rename = "worker")]
    Worker,
}

impl NodeRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "control-plane" => Some(NodeRole::ControlPlane),
            "worker" => Some(NodeRole::Worker),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::ControlPlane => write!(f, "control-plane"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

// =============================================================================
// Networking
// =============================================================================

/// Cluster-wide networking settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_family: Option<ClusterIpFamily>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_server_address: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub api_server_port: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_subnet: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_subnet: String,

    #[serde(default, rename = "disableDefaultCNI", skip_serializing_if = "is_false")]
    pub disable_default_cni: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_proxy_mode: Option<ProxyMode>,

    /// Empty list clears the host search domains; `None` inherits them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_search: Option<Vec<String>>,
}

/// IP family of the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterIpFamily {
    #[serde(rename = "ipv4")]
    Ipv4,
    #[serde(rename = "ipv6")]
    Ipv6,
    #[serde(rename = "dual")]
    DualStack,
}

impl ClusterIpFamily {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ipv4" => Some(ClusterIpFamily::Ipv4),
            "ipv6" => Some(ClusterIpFamily::Ipv6),
            "dual" | "dual-stack" => Some(ClusterIpFamily::DualStack),
            _ => None,
        }
    }
}

/// kube-proxy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyMode {
    #[serde(rename = "iptables")]
    Iptables,
    #[serde(rename = "ipvs")]
    Ipvs,
    #[serde(rename = "none")]
    None,
}

impl ProxyMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "iptables" => Some(ProxyMode::Iptables),
            "ipvs" => Some(ProxyMode::Ipvs),
            "none" => Some(ProxyMode::None),
            _ => None,
        }
    }
}

// =============================================================================
// Mounts and Port Mappings
// =============================================================================

/// Host path mounted into a node container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_path: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub selinux_relabel: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation: Option<MountPropagation>,
}

/// Mount propagation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MountPropagation {
    None,
    HostToContainer,
    Bidirectional,
}

impl MountPropagation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "None" => Some(MountPropagation::None),
            "HostToContainer" => Some(MountPropagation::HostToContainer),
            "Bidirectional" => Some(MountPropagation::Bidirectional),
            _ => None,
        }
    }
}

/// Host port forwarded into a node container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub container_port: i32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub host_port: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub listen_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<PortMappingProtocol>,
}

/// Port mapping protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortMappingProtocol {
    Tcp,
    Udp,
    Sctp,
}

impl PortMappingProtocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TCP" => Some(PortMappingProtocol::Tcp),
            "UDP" => Some(PortMappingProtocol::Udp),
            "SCTP" => Some(PortMappingProtocol::Sctp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_defaults_fill_only_empty_tags() {
        let cluster = Cluster::default().with_type_defaults();
        assert_eq!(cluster.kind, CLUSTER_KIND);
        assert_eq!(cluster.api_version, CLUSTER_API_VERSION);

        let custom = Cluster {
            api_version: "kind.x-k8s.io/v1alpha5".into(),
            ..Default::default()
        }
        .with_type_defaults();
        assert_eq!(custom.api_version, "kind.x-k8s.io/v1alpha5");
    }

    #[test]
    fn test_yaml_uses_kind_field_names() {
        let cluster = Cluster {
            nodes: vec![Node {
                role: Some(NodeRole::Worker),
                extra_mounts: vec![Mount {
                    host_path: "/dev/null".into(),
                    container_path: "/var/run/nvidia-container-devices/all".into(),
                    propagation: Some(MountPropagation::HostToContainer),
                    ..Default::default()
                }],
                extra_port_mappings: vec![PortMapping {
                    container_port: 80,
                    host_port: 8080,
                    protocol: Some(PortMappingProtocol::Tcp),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            networking: Some(Networking {
                ip_family: Some(ClusterIpFamily::DualStack),
                disable_default_cni: true,
                kube_proxy_mode: Some(ProxyMode::None),
                dns_search: Some(vec![]),
                ..Default::default()
            }),
            ..Default::default()
        }
        .with_type_defaults();

        let yaml = cluster.to_yaml().unwrap();
        assert!(yaml.contains("kind: Cluster"));
        assert!(yaml.contains("apiVersion: kind.x-k8s.io/v1alpha4"));
        assert!(yaml.contains("role: worker"));
        assert!(yaml.contains("containerPath: /var/run/nvidia-container-devices/all"));
        assert!(yaml.contains("propagation: HostToContainer"));
        assert!(yaml.contains("hostPort: 8080"));
        assert!(yaml.contains("protocol: TCP"));
        assert!(yaml.contains("ipFamily: dual"));
        assert!(yaml.contains("disableDefaultCNI: true"));
        assert!(yaml.contains("kubeProxyMode: none"));
        assert!(yaml.contains("dnsSearch: []"));
        assert!(!yaml.contains("readOnly"));
        assert!(!yaml.contains("featureGates"));
    }

    #[test]
    fn test_enum_parsing_is_exact() {
        assert_eq!(NodeRole::parse("worker"), Some(NodeRole::Worker));
        assert_eq!(NodeRole::parse("Worker"), None);
        assert_eq!(ClusterIpFamily::parse("dual-stack"), Some(ClusterIpFamily::DualStack));
        assert_eq!(MountPropagation::parse("none"), None);
        assert_eq!(PortMappingProtocol::parse("tcp"), None);
        assert_eq!(ProxyMode::parse("ipvs"), Some(ProxyMode::Ipvs));
    }
}
