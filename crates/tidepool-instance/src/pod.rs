//! Base build of an instance pod
//!
//! Composes identity, containers, volumes, scheduling and security into one
//! `Pod`. Pure: the same inputs always yield the same pod.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tidepool_common::crd::Cluster;
use tidepool_common::{
    OperatorConfig, Platform, CLUSTER_LABEL, CLUSTER_SERIAL_ANNOTATION, INSTANCE_NAME_LABEL,
    POD_ENV_HASH_ANNOTATION, POD_ROLE_INSTANCE, POD_ROLE_LABEL,
};
use tracing::debug;

use crate::affinity::create_affinity_section;
use crate::apparmor::apparmor_annotations;
use crate::containers::{create_bootstrap_container, create_postgres_container};
use crate::env::EnvConfig;
use crate::error::{BaseBuildError, InstanceError};
use crate::security::pod_security_context_for;
use crate::volumes::create_instance_volumes;

/// Name of instance `serial` of cluster `cluster_name`
pub fn instance_name(cluster_name: &str, serial: u32) -> String {
    format!("{cluster_name}-{serial}")
}

/// Build the deterministic pod of instance `serial`.
///
/// This is the first stage of synthesis; the patch overlay and lifecycle
/// hook are not applied.
pub fn build_instance(
    cluster: &Cluster,
    serial: u32,
    status_tls: bool,
    config: &OperatorConfig,
    platform: &Platform,
) -> Result<Pod, InstanceError> {
    let cluster_name = cluster.name_any();
    if serial == 0 {
        return Err(InstanceError::base_build(
            cluster_name,
            BaseBuildError::InvalidSerial(serial),
        ));
    }

    let pod_name = instance_name(&cluster_name, serial);
    let env = EnvConfig::new(cluster, &pod_name, config);
    let scheduling = &cluster.spec.affinity;

    let spec = PodSpec {
        hostname: Some(pod_name.clone()),
        init_containers: Some(vec![create_bootstrap_container(cluster, config)]),
        containers: vec![create_postgres_container(cluster, &env, config, status_tls)],
        volumes: Some(create_instance_volumes(cluster, &pod_name)),
        security_context: pod_security_context_for(cluster, platform),
        affinity: create_affinity_section(&cluster_name, scheduling),
        tolerations: non_empty(scheduling.tolerations.clone()),
        node_selector: (!scheduling.node_selector.is_empty())
            .then(|| scheduling.node_selector.clone()),
        topology_spread_constraints: non_empty(cluster.spec.topology_spread_constraints.clone()),
        scheduler_name: cluster.spec.scheduler_name.clone(),
        service_account_name: Some(cluster_name.clone()),
        termination_grace_period_seconds: Some(i64::from(cluster.max_stop_delay())),
        priority_class_name: cluster
            .spec
            .priority_class_name
            .clone()
            .filter(|p| !p.is_empty()),
        subdomain: config
            .create_any_service
            .then(|| cluster.service_any_name()),
        ..Default::default()
    };

    let mut annotations = BTreeMap::from([
        (CLUSTER_SERIAL_ANNOTATION.to_string(), serial.to_string()),
        (POD_ENV_HASH_ANNOTATION.to_string(), env.hash.clone()),
    ]);
    let sandbox = apparmor_annotations(cluster, &spec, platform)
        .map_err(|source| InstanceError::base_build(&cluster_name, source))?;
    annotations.extend(sandbox);

    let labels = BTreeMap::from([
        (CLUSTER_LABEL.to_string(), cluster_name.clone()),
        (INSTANCE_NAME_LABEL.to_string(), pod_name.clone()),
        (POD_ROLE_LABEL.to_string(), POD_ROLE_INSTANCE.to_string()),
    ]);

    debug!(pod = %pod_name, env_hash = %env.hash, "composed base instance");

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(pod_name),
            namespace: cluster.namespace(),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    })
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
