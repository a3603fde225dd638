//! End-to-end synthesis through the public API
//!
//! Uses a hand-written plugin client recording what it was asked, standing in
//! for the real plugin transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Pod};
use kube::ResourceExt;
use serde_json::Value;
use tidepool_common::crd::{
    Cluster, ClusterSpec, MonitoringConfiguration, PodAntiAffinityType, TlsConfiguration,
};
use tidepool_common::{
    OperatorConfig, Platform, PlatformSecurityPolicy, CLUSTER_SERIAL_ANNOTATION,
    POD_PATCH_ANNOTATION, POD_SPEC_ANNOTATION,
};
use tidepool_instance::{
    stored_pod_spec, EnvConfig, HookContext, HookError, InstanceError, InstanceSynthesizer,
    LifecycleHookClient, OperationVerb,
};

// =============================================================================
// Fixtures
// =============================================================================

fn cluster() -> Cluster {
    let mut cluster = Cluster::new(
        "orders",
        ClusterSpec {
            image_name: Some("postgres:17.2".to_string()),
            max_start_delay: Some(120),
            liveness_probe_timeout: Some(45),
            monitoring: Some(MonitoringConfiguration {
                tls: Some(TlsConfiguration { enabled: true }),
            }),
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some("shop".to_string());
    cluster.spec.affinity.pod_anti_affinity_type = Some(PodAntiAffinityType::Required);
    cluster
}

/// Plugin adding a monitoring sidecar and counting its invocations
#[derive(Default)]
struct SidecarPlugin {
    calls: AtomicUsize,
}

#[async_trait]
impl LifecycleHookClient for SidecarPlugin {
    async fn lifecycle_hook(
        &self,
        verb: OperationVerb,
        _cluster: &Cluster,
        pod: &Pod,
    ) -> Result<Value, HookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if verb != OperationVerb::Evaluate {
            return Err(HookError::Rejected(format!("unexpected verb {verb}")));
        }

        let mut pod = pod.clone();
        if let Some(spec) = pod.spec.as_mut() {
            spec.containers.push(Container {
                name: "exporter".to_string(),
                image: Some("exporter:1".to_string()),
                ..Default::default()
            });
        }
        serde_json::to_value(pod).map_err(|e| HookError::Transport(e.to_string()))
    }
}

/// Plugin that only answers after a long pause
struct SlowPlugin;

#[async_trait]
impl LifecycleHookClient for SlowPlugin {
    async fn lifecycle_hook(
        &self,
        _verb: OperationVerb,
        _cluster: &Cluster,
        pod: &Pod,
    ) -> Result<Value, HookError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        serde_json::to_value(pod).map_err(|e| HookError::Transport(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn full_pipeline_with_patch_and_plugin() {
    let mut cluster = cluster();
    cluster.annotations_mut().insert(
        POD_PATCH_ANNOTATION.to_string(),
        r#"[{"op":"add","path":"/metadata/labels/tier","value":"gold"}]"#.to_string(),
    );
    let config = OperatorConfig::default();
    let platform = Platform::default();
    let plugin = SidecarPlugin::default();

    let pod = InstanceSynthesizer::new(&cluster, 2, &config, &platform)
        .with_status_tls(true)
        .with_hook_client(&plugin)
        .synthesize()
        .await
        .expect("synthesis should succeed");

    assert_eq!(plugin.calls.load(Ordering::SeqCst), 1);
    assert_eq!(pod.name_any(), "orders-2");
    assert_eq!(pod.labels().get("tier").map(String::as_str), Some("gold"));
    assert_eq!(
        pod.annotations().get(CLUSTER_SERIAL_ANNOTATION).map(String::as_str),
        Some("2")
    );

    let spec = pod.spec.as_ref().expect("spec");
    let postgres = &spec.containers[0];
    assert_eq!(postgres.name, "postgres");
    assert_eq!(postgres.image.as_deref(), Some("postgres:17.2"));

    let command = postgres.command.as_ref().expect("command");
    assert!(command.contains(&"--status-port-tls".to_string()));
    assert!(command.contains(&"--metrics-port-tls".to_string()));

    let startup = postgres.startup_probe.as_ref().expect("startup probe");
    assert_eq!(startup.failure_threshold, Some(12));
    let liveness = postgres.liveness_probe.as_ref().expect("liveness probe");
    assert_eq!(liveness.failure_threshold, Some(5));
    assert_eq!(
        liveness.http_get.as_ref().and_then(|h| h.scheme.as_deref()),
        Some("HTTPS")
    );

    let anti = spec
        .affinity
        .as_ref()
        .and_then(|a| a.pod_anti_affinity.as_ref())
        .expect("anti-affinity");
    assert_eq!(
        anti.required_during_scheduling_ignored_during_execution
            .as_ref()
            .map(Vec::len),
        Some(1)
    );

    let env = EnvConfig::new(&cluster, "orders-2", &config);
    assert!(env.is_env_equal(postgres));

    let stored = stored_pod_spec(&pod)
        .expect("snapshot should decode")
        .expect("snapshot present");
    let names: Vec<_> = stored.containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["postgres", "exporter"]);
}

#[tokio::test(start_paused = true)]
async fn slow_plugin_hits_deadline() {
    let cluster = cluster();
    let config = OperatorConfig::default();
    let platform = Platform::default();

    let err = InstanceSynthesizer::new(&cluster, 1, &config, &platform)
        .with_hook_client(&SlowPlugin)
        .with_hook_context(HookContext::new().with_deadline(Duration::from_secs(5)))
        .synthesize()
        .await
        .expect_err("slow plugin should time out");

    assert!(matches!(
        err,
        InstanceError::HookInvocation {
            source: HookError::DeadlineExceeded(_),
            ..
        }
    ));
    assert_eq!(err.stage(), "lifecycle-hook");
}

#[tokio::test]
async fn restricted_platform_without_plugin() {
    let cluster = cluster();
    let config = OperatorConfig::default();
    let platform = Platform {
        security_policy: PlatformSecurityPolicy::Restricted,
        apparmor_supported: false,
    };

    let pod = InstanceSynthesizer::new(&cluster, 1, &config, &platform)
        .synthesize()
        .await
        .expect("synthesis should succeed");

    let spec = pod.spec.as_ref().expect("spec");
    assert!(spec.security_context.is_none());
    assert!(pod.annotations().contains_key(POD_SPEC_ANNOTATION));
}

#[tokio::test]
async fn patch_that_does_not_apply_is_reported() {
    let mut cluster = cluster();
    cluster.annotations_mut().insert(
        POD_PATCH_ANNOTATION.to_string(),
        r#"[{"op":"remove","path":"/spec/doesNotExist"}]"#.to_string(),
    );
    let config = OperatorConfig::default();
    let platform = Platform::default();
    let plugin = SidecarPlugin::default();

    let err = InstanceSynthesizer::new(&cluster, 1, &config, &platform)
        .with_hook_client(&plugin)
        .synthesize()
        .await
        .expect_err("patch should fail");

    assert!(matches!(err, InstanceError::PatchApply { .. }));
    assert_eq!(plugin.calls.load(Ordering::SeqCst), 0);
}
