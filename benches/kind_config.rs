//! Benchmark for translating declarative kind configuration
//!
//! Target: a 64-node tree well under a millisecond

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nvkind_provisioner::kindconfig::{translate_value, Cluster};
use serde_json::{json, Value};

fn declarative_tree(workers: usize) -> Value {
    let mut nodes = vec![json!({ "role": "control-plane" })];
    for i in 0..workers {
        nodes.push(json!({
            "role": "worker",
            "image": "kindest/node:v1.29.7",
            "labels": { "gpu": "true", "index": i.to_string() },
            "extra_mounts": [
                {
                    "host_path": "/dev/null",
                    "container_path": format!("/var/run/nvidia-container-devices/{}", i % 8),
                    "propagation": "HostToContainer"
                }
            ],
            "extra_port_mappings": [
                { "container_port": 80, "host_port": 8000 + i, "protocol": "TCP" }
            ],
            "kubeadm_config_patches": ["kind: JoinConfiguration"]
        }));
    }

    json!([{
        "kind": "Cluster",
        "api_version": "kind.x-k8s.io/v1alpha4",
        "node": nodes,
        "networking": [{
            "ip_family": "dual",
            "api_server_port": 6443,
            "kube_proxy_mode": "ipvs",
            "dns_search": ["cluster.local"]
        }],
        "runtime_config": { "api_alpha": "false" },
        "feature_gates": { "DynamicResourceAllocation": "true" }
    }])
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("kind_config");

    for workers in [4usize, 64] {
        let tree = declarative_tree(workers);
        group.throughput(Throughput::Elements(workers as u64 + 1));
        group.bench_with_input(BenchmarkId::new("translate", workers), &tree, |b, tree| {
            b.iter(|| translate_value(black_box(tree)));
        });
    }

    group.finish();
}

fn bench_to_yaml(c: &mut Criterion) {
    let cluster: Cluster = translate_value(&declarative_tree(64))
        .unwrap_or_default()
        .with_type_defaults();

    c.bench_function("kind_config/to_yaml_64", |b| {
        b.iter(|| black_box(&cluster).to_yaml());
    });
}

criterion_group!(benches, bench_translate, bench_to_yaml);
criterion_main!(benches);
