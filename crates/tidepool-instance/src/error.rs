//! Instance synthesis error types
//!
//! Every variant aborts the whole synthesis call. Each one names the cluster
//! and the stage that failed so the control loop can report it verbatim.

use thiserror::Error;

use crate::pipeline::hook::HookError;

/// Reasons the deterministic part of the build can fail
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BaseBuildError {
    /// Serials start at 1
    #[error("instance serial must be positive, got {0}")]
    InvalidSerial(u32),

    /// An AppArmor annotation carries a profile the runtime cannot load
    #[error("invalid AppArmor profile '{profile}' for container '{container}'")]
    InvalidAppArmorProfile {
        /// Container named by the annotation key
        container: String,
        /// Offending annotation value
        profile: String,
    },
}

/// Errors that can occur while synthesizing an instance
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The deterministic pod could not be composed
    #[error("while building instance for cluster {cluster}: {source}")]
    BaseBuild {
        /// Cluster name
        cluster: String,
        /// What went wrong
        source: BaseBuildError,
    },

    /// The pod could not be serialized
    #[error("while serializing pod for cluster {cluster} ({stage}): {source}")]
    Serialization {
        /// Cluster name
        cluster: String,
        /// Pipeline stage that needed the serialization
        stage: &'static str,
        /// Underlying serde error
        source: serde_json::Error,
    },

    /// The patch annotation is not a valid JSON patch
    #[error("while decoding JSON patch from annotation of cluster {cluster}: {source}")]
    PatchDecode {
        /// Cluster name
        cluster: String,
        /// Underlying serde error
        source: serde_json::Error,
    },

    /// The JSON patch does not apply to the pod
    #[error("while applying JSON patch from annotation of cluster {cluster}: {source}")]
    PatchApply {
        /// Cluster name
        cluster: String,
        /// Underlying patch error
        source: json_patch::PatchError,
    },

    /// The patched document is no longer a pod
    #[error("while deserializing patched pod for cluster {cluster}: {source}")]
    PatchDeserialize {
        /// Cluster name
        cluster: String,
        /// Underlying serde error
        source: serde_json::Error,
    },

    /// The lifecycle hook failed, timed out, or was cancelled
    #[error("while invoking the lifecycle instance evaluation hook for cluster {cluster}: {source}")]
    HookInvocation {
        /// Cluster name
        cluster: String,
        /// Hook failure
        source: HookError,
    },

    /// The lifecycle hook answered with something that is not a pod
    #[error("lifecycle hook for cluster {cluster} returned {found}, expected a v1 Pod")]
    HookResponseType {
        /// Cluster name
        cluster: String,
        /// Description of what was returned
        found: String,
    },
}

impl InstanceError {
    /// Create a base build error
    pub fn base_build(cluster: impl Into<String>, source: BaseBuildError) -> Self {
        Self::BaseBuild {
            cluster: cluster.into(),
            source,
        }
    }

    /// Create a hook response type error
    pub fn hook_response_type(cluster: impl Into<String>, found: impl Into<String>) -> Self {
        Self::HookResponseType {
            cluster: cluster.into(),
            found: found.into(),
        }
    }

    /// Pipeline stage the error originates from
    pub fn stage(&self) -> &'static str {
        match self {
            Self::BaseBuild { .. } => "base-build",
            Self::Serialization { stage, .. } => *stage,
            Self::PatchDecode { .. } | Self::PatchApply { .. } | Self::PatchDeserialize { .. } => {
                "patch-overlay"
            }
            Self::HookInvocation { .. } | Self::HookResponseType { .. } => "lifecycle-hook",
        }
    }
}
