//! InstanceSynthesizer: runs the full synthesis pipeline
//!
//! Stages run strictly in order and the first failure aborts the call:
//!
//! 1. base build ([`build_instance`])
//! 2. JSON patch overlay from the cluster annotation
//! 3. lifecycle hook, when a client is supplied
//! 4. the resolved `PodSpec` is stamped on the pod

pub(crate) mod hook;
pub(crate) mod patch;

use k8s_openapi::api::core::v1::{Pod, PodSpec};
use kube::ResourceExt;
use tidepool_common::crd::Cluster;
use tidepool_common::{OperatorConfig, Platform, POD_SPEC_ANNOTATION};
use tracing::{debug, instrument, trace};

use crate::error::InstanceError;
use crate::pod::build_instance;
use hook::{HookContext, LifecycleHookClient};
use patch::apply_pod_patch;

/// Synthesizes the pod of one instance.
///
/// Uses a builder pattern for the optional parts:
///
/// ```rust,ignore
/// let pod = InstanceSynthesizer::new(&cluster, serial, &config, &platform)
///     .with_status_tls(true)
///     .with_hook_client(&plugins)
///     .with_hook_context(HookContext::from_config(&config).with_cancellation(token))
///     .synthesize()
///     .await?;
/// ```
pub struct InstanceSynthesizer<'a> {
    cluster: &'a Cluster,
    serial: u32,
    config: &'a OperatorConfig,
    platform: &'a Platform,
    status_tls: bool,
    hook_client: Option<&'a dyn LifecycleHookClient>,
    hook_context: HookContext,
}

impl<'a> InstanceSynthesizer<'a> {
    /// Create a synthesizer for instance `serial` of `cluster`.
    ///
    /// The hook deadline defaults to the configured hook timeout.
    pub fn new(
        cluster: &'a Cluster,
        serial: u32,
        config: &'a OperatorConfig,
        platform: &'a Platform,
    ) -> Self {
        Self {
            cluster,
            serial,
            config,
            platform,
            status_tls: false,
            hook_client: None,
            hook_context: HookContext::from_config(config),
        }
    }

    /// Serve the status endpoint, and therefore the probes, over TLS
    pub fn with_status_tls(mut self, enabled: bool) -> Self {
        self.status_tls = enabled;
        self
    }

    /// Submit the pod to the cluster plugins before stamping it
    pub fn with_hook_client(mut self, client: &'a dyn LifecycleHookClient) -> Self {
        self.hook_client = Some(client);
        self
    }

    /// Bound the lifecycle hook call
    pub fn with_hook_context(mut self, context: HookContext) -> Self {
        self.hook_context = context;
        self
    }

    /// Run the synchronous stages: base build then patch overlay
    pub fn build_patched(&self) -> Result<Pod, InstanceError> {
        let pod = build_instance(
            self.cluster,
            self.serial,
            self.status_tls,
            self.config,
            self.platform,
        )?;

        match self.cluster.pod_patch() {
            Some(patch) => apply_pod_patch(&self.cluster.name_any(), &pod, patch),
            None => {
                trace!("no pod patch declared");
                Ok(pod)
            }
        }
    }

    /// Run every stage and return the stamped pod
    #[instrument(
        skip(self),
        fields(
            cluster = %self.cluster.name_any(),
            namespace = %self.cluster.namespace().unwrap_or_default(),
            serial = self.serial,
        )
    )]
    pub async fn synthesize(&self) -> Result<Pod, InstanceError> {
        let mut pod = self.build_patched()?;

        if let Some(client) = self.hook_client {
            pod = hook::evaluate(client, &self.hook_context, self.cluster, &pod).await?;
        } else {
            trace!("no lifecycle hook client, skipping evaluation");
        }

        annotate_resolved_spec(&self.cluster.name_any(), &mut pod)?;
        debug!(pod = %pod.name_any(), "synthesized instance");
        Ok(pod)
    }
}

/// Store the JSON form of the pod's spec under the pod spec annotation
fn annotate_resolved_spec(cluster_name: &str, pod: &mut Pod) -> Result<(), InstanceError> {
    let empty = PodSpec::default();
    let spec = pod.spec.as_ref().unwrap_or(&empty);
    let snapshot = serde_json::to_string(spec).map_err(|source| InstanceError::Serialization {
        cluster: cluster_name.to_string(),
        stage: "self-annotation",
        source,
    })?;

    pod.annotations_mut()
        .insert(POD_SPEC_ANNOTATION.to_string(), snapshot);
    Ok(())
}
