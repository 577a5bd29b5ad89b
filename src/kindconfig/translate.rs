//! Config Translator
//!
//! Converts the untyped `kind_config` block of a resource configuration into
//! a [`Cluster`] specification.
//!
//! Translation is total: a missing key, or a value of the wrong type, leaves
//! the field at its zero value. Enum-valued fields follow the same policy, so
//! an unrecognised role, IP family, proxy mode, propagation mode or protocol
//! is dropped rather than reported.

use super::types::{
    Cluster, ClusterIpFamily, Mount, MountPropagation, Networking, Node, NodeRole, PortMapping,
    PortMappingProtocol, ProxyMode,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Nested declarative configuration as supplied by the user
pub type ConfigTree = Map<String, Value>;

// =============================================================================
// Entry Point
// =============================================================================

/// Translate a `kind_config` block into a cluster specification
pub fn translate(tree: &ConfigTree) -> Cluster {
    Cluster {
        kind: string(tree, "kind"),
        api_version: string(tree, "api_version"),
        nodes: blocks(tree, "node").map(translate_node).collect(),
        networking: single_block(tree, "networking").map(translate_networking),
        containerd_config_patches: strings(tree, "containerd_config_patches"),
        runtime_config: runtime_config(tree),
        feature_gates: feature_gates(tree),
    }
}

/// Translate a `kind_config` value in either block form (one-element list)
/// or plain mapping form
pub fn translate_value(value: &Value) -> Option<Cluster> {
    as_single_block(value).map(translate)
}

// =============================================================================
// Per-Block Rules
// =============================================================================

fn translate_node(tree: &ConfigTree) -> Node {
    Node {
        role: enum_field(tree, "role", NodeRole::parse),
        image: string(tree, "image"),
        extra_mounts: blocks(tree, "extra_mounts").map(translate_mount).collect(),
        extra_port_mappings: blocks(tree, "extra_port_mappings")
            .map(translate_port_mapping)
            .collect(),
        labels: string_map(tree, "labels"),
        kubeadm_config_patches: strings(tree, "kubeadm_config_patches"),
    }
}

fn translate_networking(tree: &ConfigTree) -> Networking {
    Networking {
        ip_family: enum_field(tree, "ip_family", ClusterIpFamily::parse),
        api_server_address: string(tree, "api_server_address"),
        api_server_port: int(tree, "api_server_port"),
        pod_subnet: string(tree, "pod_subnet"),
        service_subnet: string(tree, "service_subnet"),
        disable_default_cni: flag(tree, "disable_default_cni"),
        kube_proxy_mode: enum_field(tree, "kube_proxy_mode", ProxyMode::parse),
        // Always set once the networking block exists
        dns_search: Some(strings(tree, "dns_search")),
    }
}

fn translate_mount(tree: &ConfigTree) -> Mount {
    Mount {
        container_path: string(tree, "container_path"),
        host_path: string(tree, "host_path"),
        read_only: flag(tree, "read_only"),
        selinux_relabel: flag(tree, "selinux_relabel"),
        propagation: enum_field(tree, "propagation", MountPropagation::parse),
    }
}

fn translate_port_mapping(tree: &ConfigTree) -> PortMapping {
    PortMapping {
        container_port: int(tree, "container_port"),
        host_port: int(tree, "host_port"),
        listen_address: string(tree, "listen_address"),
        protocol: enum_field(tree, "protocol", PortMappingProtocol::parse),
    }
}

/// Identifiers in the config language cannot contain `/`, so every `_` in a
/// key is rewritten (`api_alpha` becomes `api/alpha`).
fn runtime_config(tree: &ConfigTree) -> BTreeMap<String, String> {
    let Some(entries) = tree.get("runtime_config").and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|(key, value)| {
            scalar_string(value).map(|value| (key.replace('_', "/"), value))
        })
        .collect()
}

/// A case-insensitive `"true"` or a boolean `true` enables a gate.
fn feature_gates(tree: &ConfigTree) -> BTreeMap<String, bool> {
    let Some(entries) = tree.get("feature_gates").and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .map(|(gate, value)| {
            let enabled = match value {
                Value::String(s) => s.eq_ignore_ascii_case("true"),
                Value::Bool(b) => *b,
                _ => false,
            };
            (gate.clone(), enabled)
        })
        .collect()
}

// =============================================================================
// Field Accessors
// =============================================================================

fn string(tree: &ConfigTree, key: &str) -> String {
    tree.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int(tree: &ConfigTree, key: &str) -> i32 {
    tree.get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or_default()
}

fn flag(tree: &ConfigTree, key: &str) -> bool {
    tree.get(key).and_then(Value::as_bool).unwrap_or_default()
}

fn strings(tree: &ConfigTree, key: &str) -> Vec<String> {
    tree.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_map(tree: &ConfigTree, key: &str) -> BTreeMap<String, String> {
    tree.get(key)
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn enum_field<T>(tree: &ConfigTree, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    tree.get(key).and_then(Value::as_str).and_then(parse)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Repeated blocks, in input order
fn blocks<'a>(tree: &'a ConfigTree, key: &str) -> impl Iterator<Item = &'a ConfigTree> {
    let items: Vec<&ConfigTree> = match tree.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(block)) => vec![block],
        _ => Vec::new(),
    };
    items.into_iter()
}

/// A block allowed at most once
fn single_block<'a>(tree: &'a ConfigTree, key: &str) -> Option<&'a ConfigTree> {
    tree.get(key).and_then(as_single_block)
}

fn as_single_block(value: &Value) -> Option<&ConfigTree> {
    match value {
        Value::Object(block) => Some(block),
        Value::Array(items) if items.len() == 1 => items[0].as_object(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_empty_tree_yields_zero_values() {
        let cluster = translate(&ConfigTree::new());

        assert_eq!(cluster, Cluster::default());
        assert!(cluster.kind.is_empty());
        assert!(cluster.api_version.is_empty());
        assert!(cluster.nodes.is_empty());
        assert!(cluster.networking.is_none());
        assert!(cluster.containerd_config_patches.is_empty());
        assert!(cluster.runtime_config.is_empty());
        assert!(cluster.feature_gates.is_empty());
    }

    #[test]
    fn test_runtime_config_rewrites_every_underscore() {
        let cluster = translate(&tree(json!({
            "runtime_config": {
                "api_alpha": "false",
                "api_beta_v1_extra": "true",
                "plain": "x",
            }
        })));

        assert_eq!(cluster.runtime_config.get("api/alpha").map(String::as_str), Some("false"));
        assert_eq!(
            cluster.runtime_config.get("api/beta/v1/extra").map(String::as_str),
            Some("true")
        );
        assert_eq!(cluster.runtime_config.get("plain").map(String::as_str), Some("x"));
        assert!(!cluster.runtime_config.keys().any(|k| k.contains('_')));
    }

    #[test]
    fn test_feature_gates_only_true_enables() {
        let cluster = translate(&tree(json!({
            "feature_gates": {
                "Lower": "true",
                "Title": "True",
                "Upper": "TRUE",
                "Off": "false",
                "Yes": "yes",
                "Empty": "",
            }
        })));

        let gates = &cluster.feature_gates;
        assert_eq!(gates.get("Lower"), Some(&true));
        assert_eq!(gates.get("Title"), Some(&true));
        assert_eq!(gates.get("Upper"), Some(&true));
        assert_eq!(gates.get("Off"), Some(&false));
        assert_eq!(gates.get("Yes"), Some(&false));
        assert_eq!(gates.get("Empty"), Some(&false));
    }

    #[test]
    fn test_node_roles() {
        let cluster = translate(&tree(json!({
            "node": [
                { "role": "control-plane" },
                { "role": "worker" },
                { "role": "bogus" },
                {},
            ]
        })));

        let roles: Vec<_> = cluster.nodes.iter().map(|n| n.role).collect();
        assert_eq!(
            roles,
            vec![Some(NodeRole::ControlPlane), Some(NodeRole::Worker), None, None]
        );
    }

    #[test]
    fn test_node_order_is_preserved() {
        let nodes: Vec<Value> = (0..7)
            .map(|i| json!({ "image": format!("kindest/node:v1.29.{i}") }))
            .collect();
        let cluster = translate(&tree(json!({ "node": nodes })));

        assert_eq!(cluster.nodes.len(), 7);
        for (i, node) in cluster.nodes.iter().enumerate() {
            assert_eq!(node.image, format!("kindest/node:v1.29.{i}"));
        }
    }

    #[test]
    fn test_node_nested_collections() {
        let cluster = translate(&tree(json!({
            "node": [{
                "role": "worker",
                "labels": { "gpu": "true", "ignored": 3 },
                "kubeadm_config_patches": ["kind: JoinConfiguration\n"],
                "extra_mounts": [
                    {
                        "host_path": "/dev/null",
                        "container_path": "/var/run/nvidia-container-devices/0",
                        "propagation": "HostToContainer",
                        "read_only": true,
                    },
                    { "host_path": "/data", "container_path": "/data", "propagation": "sideways" },
                ],
                "extra_port_mappings": [
                    { "container_port": 80, "host_port": 8080, "protocol": "UDP", "listen_address": "127.0.0.1" },
                    { "container_port": 443, "protocol": "QUIC" },
                ],
            }]
        })));

        let node = &cluster.nodes[0];
        assert_eq!(node.labels.len(), 1);
        assert_eq!(node.labels.get("gpu").map(String::as_str), Some("true"));
        assert_eq!(node.kubeadm_config_patches, vec!["kind: JoinConfiguration\n"]);

        assert_eq!(node.extra_mounts.len(), 2);
        assert_eq!(node.extra_mounts[0].container_path, "/var/run/nvidia-container-devices/0");
        assert_eq!(node.extra_mounts[0].propagation, Some(MountPropagation::HostToContainer));
        assert!(node.extra_mounts[0].read_only);
        assert!(!node.extra_mounts[0].selinux_relabel);
        assert_eq!(node.extra_mounts[1].propagation, None);

        assert_eq!(node.extra_port_mappings[0].host_port, 8080);
        assert_eq!(node.extra_port_mappings[0].protocol, Some(PortMappingProtocol::Udp));
        assert_eq!(node.extra_port_mappings[0].listen_address, "127.0.0.1");
        assert_eq!(node.extra_port_mappings[1].container_port, 443);
        assert_eq!(node.extra_port_mappings[1].protocol, None);
    }

    #[test]
    fn test_networking_block() {
        let cluster = translate(&tree(json!({
            "networking": [{
                "api_server_address": "127.0.0.1",
                "api_server_port": 6443,
                "disable_default_cni": true,
                "ip_family": "ipv6",
                "kube_proxy_mode": "none",
                "pod_subnet": "10.244.0.0/16",
                "service_subnet": "10.96.0.0/12",
                "dns_search": ["cluster.local", "example.com"],
            }]
        })));

        let networking = cluster.networking.unwrap();
        assert_eq!(networking.api_server_address, "127.0.0.1");
        assert_eq!(networking.api_server_port, 6443);
        assert!(networking.disable_default_cni);
        assert_eq!(networking.ip_family, Some(ClusterIpFamily::Ipv6));
        assert_eq!(networking.kube_proxy_mode, Some(ProxyMode::None));
        assert_eq!(networking.pod_subnet, "10.244.0.0/16");
        assert_eq!(networking.service_subnet, "10.96.0.0/12");
        assert_eq!(
            networking.dns_search,
            Some(vec!["cluster.local".to_string(), "example.com".to_string()])
        );
    }

    #[test]
    fn test_networking_present_always_sets_dns_search() {
        let cluster = translate(&tree(json!({ "networking": { "ip_family": "ipv5" } })));

        let networking = cluster.networking.unwrap();
        assert_eq!(networking.ip_family, None);
        assert_eq!(networking.dns_search, Some(vec![]));
    }

    #[test]
    fn test_repeated_networking_blocks_are_ignored() {
        let cluster = translate(&tree(json!({ "networking": [{}, {}] })));
        assert!(cluster.networking.is_none());
    }

    #[test]
    fn test_wrong_types_degrade_to_zero_values() {
        let cluster = translate(&tree(json!({
            "kind": 7,
            "node": "not-a-list",
            "containerd_config_patches": ["a", 1, "b"],
            "networking": { "api_server_port": "6443" },
        })));

        assert!(cluster.kind.is_empty());
        assert!(cluster.nodes.is_empty());
        assert_eq!(cluster.containerd_config_patches, vec!["a", "b"]);
        assert_eq!(cluster.networking.unwrap().api_server_port, 0);
    }

    #[test]
    fn test_translate_value_accepts_block_and_map_forms() {
        let map_form = json!({ "kind": "Cluster" });
        let block_form = json!([{ "kind": "Cluster" }]);

        assert_eq!(translate_value(&map_form).unwrap().kind, "Cluster");
        assert_eq!(translate_value(&block_form).unwrap().kind, "Cluster");
        assert!(translate_value(&json!([])).is_none());
        assert!(translate_value(&Value::Null).is_none());
    }
}
