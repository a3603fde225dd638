//! Lifecycle hook exposed to cluster plugins
//!
//! Plugins get one chance to rewrite the instance pod before it is stamped.
//! The transport is provided by the caller through [`LifecycleHookClient`];
//! this module bounds the call and checks what comes back.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde_json::Value;
use thiserror::Error;
use tidepool_common::crd::Cluster;
use tidepool_common::OperatorConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::InstanceError;

/// Operation the hook is asked to perform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationVerb {
    /// Review and possibly rewrite a freshly built instance
    Evaluate,
}

impl std::fmt::Display for OperationVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// Errors from a lifecycle hook invocation
#[derive(Debug, Error)]
pub enum HookError {
    /// The plugin could not be reached
    #[error("plugin transport failed: {0}")]
    Transport(String),

    /// The plugin refused the instance
    #[error("plugin rejected the instance: {0}")]
    Rejected(String),

    /// The plugin did not answer in time
    #[error("plugin did not answer within {0:?}")]
    DeadlineExceeded(Duration),

    /// The caller gave up on the call
    #[error("hook invocation was cancelled")]
    Cancelled,
}

/// Client of the plugins extending a cluster
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleHookClient: Send + Sync {
    /// Submit `pod` to the plugins of `cluster`, returning the resulting
    /// object in JSON form
    async fn lifecycle_hook(
        &self,
        verb: OperationVerb,
        cluster: &Cluster,
        pod: &Pod,
    ) -> Result<Value, HookError>;
}

/// Bounds of a lifecycle hook call
#[derive(Clone, Debug, Default)]
pub struct HookContext {
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl HookContext {
    /// Unbounded context that is never cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Context bounded by the configured hook timeout
    pub fn from_config(config: &OperatorConfig) -> Self {
        let context = Self::new();
        if config.hook_timeout.is_zero() {
            context
        } else {
            context.with_deadline(config.hook_timeout)
        }
    }

    /// Fail the call if the hook has not answered after `deadline`
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fail the call as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Configured deadline
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Token cancelling the call
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Run the evaluate hook on `pod` and read back the pod it returns
pub(crate) async fn evaluate(
    client: &dyn LifecycleHookClient,
    context: &HookContext,
    cluster: &Cluster,
    pod: &Pod,
) -> Result<Pod, InstanceError> {
    let cluster_name = cluster.name_any();
    debug!(
        cluster = %cluster_name,
        plugins = ?cluster.enabled_plugins(),
        deadline = ?context.deadline(),
        "invoking lifecycle hook"
    );
    let call = client.lifecycle_hook(OperationVerb::Evaluate, cluster, pod);

    let bounded = async {
        match context.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .unwrap_or_else(|_| Err(HookError::DeadlineExceeded(deadline))),
            None => call.await,
        }
    };

    let result = tokio::select! {
        biased;
        _ = context.cancellation().cancelled() => Err(HookError::Cancelled),
        result = bounded => result,
    };

    let response = result.map_err(|source| {
        warn!(cluster = %cluster_name, error = %source, "lifecycle hook failed");
        InstanceError::HookInvocation {
            cluster: cluster_name.clone(),
            source,
        }
    })?;

    let pod = parse_hook_response(&cluster_name, response)?;
    debug!(
        cluster = %cluster_name,
        verb = %OperationVerb::Evaluate,
        "lifecycle hook evaluated instance"
    );
    Ok(pod)
}

/// Read a hook response as a `v1` `Pod`
pub(crate) fn parse_hook_response(
    cluster_name: &str,
    response: Value,
) -> Result<Pod, InstanceError> {
    let api_version = response.get("apiVersion").and_then(Value::as_str);
    let kind = response.get("kind").and_then(Value::as_str);

    if api_version != Some("v1") || kind != Some("Pod") {
        return Err(InstanceError::hook_response_type(
            cluster_name,
            format!(
                "apiVersion {:?} kind {:?}",
                api_version.unwrap_or_default(),
                kind.unwrap_or_default()
            ),
        ));
    }

    serde_json::from_value(response).map_err(|e| {
        InstanceError::hook_response_type(cluster_name, format!("an unreadable Pod ({e})"))
    })
}
