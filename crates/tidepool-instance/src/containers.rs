//! Containers of an instance
//!
//! Every instance runs one init container copying the instance manager into
//! the shared scratch volume, and the PostgreSQL container running under that
//! manager.

use k8s_openapi::api::core::v1::{Container, ContainerPort};
use tidepool_common::crd::Cluster;
use tidepool_common::OperatorConfig;

use crate::env::EnvConfig;
use crate::probes::InstanceProbes;
use crate::security::create_container_security_context;
use crate::volumes::create_instance_volume_mounts;
use crate::{
    BOOTSTRAP_CONTAINER_NAME, METRICS_PORT, POSTGRES_CONTAINER_NAME, POSTGRES_PORT, STATUS_PORT,
};

/// Flag serving the status endpoint over TLS
pub const STATUS_PORT_TLS_FLAG: &str = "--status-port-tls";

/// Flag serving the metrics endpoint over TLS
pub const METRICS_PORT_TLS_FLAG: &str = "--metrics-port-tls";

/// Init container copying the instance manager out of the operator image
pub fn create_bootstrap_container(cluster: &Cluster, config: &OperatorConfig) -> Container {
    let mut command = vec![
        "/manager".to_string(),
        "bootstrap".to_string(),
        "/controller/manager".to_string(),
    ];
    push_log_level(&mut command, cluster);

    Container {
        name: BOOTSTRAP_CONTAINER_NAME.to_string(),
        image: Some(config.operator_image_name.clone()),
        image_pull_policy: cluster.spec.image_pull_policy.clone(),
        command: Some(command),
        volume_mounts: Some(create_instance_volume_mounts(cluster)),
        resources: cluster.spec.resources.clone(),
        security_context: Some(create_container_security_context(cluster.seccomp_profile())),
        ..Default::default()
    }
}

/// PostgreSQL container running the instance manager
pub fn create_postgres_container(
    cluster: &Cluster,
    env: &EnvConfig,
    config: &OperatorConfig,
    status_tls: bool,
) -> Container {
    let probes = InstanceProbes::for_cluster(cluster, status_tls);

    let mut command = vec![
        "/controller/manager".to_string(),
        "instance".to_string(),
        "run".to_string(),
    ];
    if status_tls {
        add_flag_once(&mut command, STATUS_PORT_TLS_FLAG);
    }
    if cluster.is_metrics_tls_enabled() {
        add_flag_once(&mut command, METRICS_PORT_TLS_FLAG);
    }
    push_log_level(&mut command, cluster);

    Container {
        name: POSTGRES_CONTAINER_NAME.to_string(),
        image: Some(cluster.resolved_image(&config.postgres_image_name).to_string()),
        image_pull_policy: cluster.spec.image_pull_policy.clone(),
        command: Some(command),
        env: Some(env.env_vars.clone()),
        env_from: Some(env.env_from.clone()),
        volume_mounts: Some(create_instance_volume_mounts(cluster)),
        startup_probe: Some(probes.startup),
        readiness_probe: Some(probes.readiness),
        liveness_probe: Some(probes.liveness),
        resources: cluster.spec.resources.clone(),
        ports: Some(vec![
            tcp_port("postgresql", POSTGRES_PORT),
            tcp_port("metrics", METRICS_PORT),
            tcp_port("status", STATUS_PORT),
        ]),
        security_context: Some(create_container_security_context(cluster.seccomp_profile())),
        ..Default::default()
    }
}

fn add_flag_once(command: &mut Vec<String>, flag: &str) {
    if !command.iter().any(|arg| arg == flag) {
        command.push(flag.to_string());
    }
}

fn push_log_level(command: &mut Vec<String>, cluster: &Cluster) {
    if let Some(level) = cluster.spec.log_level {
        command.push(format!("--log-level={level}"));
    }
}

fn tcp_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}
