//! JSON patch overlay declared on the cluster

use k8s_openapi::api::core::v1::Pod;
use tracing::debug;

use crate::error::InstanceError;

/// Apply the RFC 6902 patch `patch` to `pod`.
///
/// The pod goes through its JSON form: serialized, patched, then read back.
/// Each of the three steps fails with its own error.
pub fn apply_pod_patch(cluster_name: &str, pod: &Pod, patch: &str) -> Result<Pod, InstanceError> {
    let mut document =
        serde_json::to_value(pod).map_err(|source| InstanceError::Serialization {
            cluster: cluster_name.to_string(),
            stage: "patch-overlay",
            source,
        })?;

    let patch: json_patch::Patch =
        serde_json::from_str(patch).map_err(|source| InstanceError::PatchDecode {
            cluster: cluster_name.to_string(),
            source,
        })?;

    json_patch::patch(&mut document, &patch.0).map_err(|source| InstanceError::PatchApply {
        cluster: cluster_name.to_string(),
        source,
    })?;

    let patched = serde_json::from_value(document).map_err(|source| {
        InstanceError::PatchDeserialize {
            cluster: cluster_name.to_string(),
            source,
        }
    })?;

    debug!(cluster = %cluster_name, operations = patch.0.len(), "applied pod patch");
    Ok(patched)
}
